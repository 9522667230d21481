//! Authentication routes — API key to JWT exchange.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::Role;

use crate::middleware::auth::encode_jwt;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth/token", post(issue_token))
}

/// Request body for token exchange.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub api_key: String,
}

/// Response for successful token exchange.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user_id: Uuid,
    pub role: Role,
}

/// POST /api/auth/token — Exchange an API key for a short-lived JWT.
async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .store
        .user_by_api_key(&req.api_key)
        .await?
        .ok_or_else(|| AppError::Auth("Unknown API key".to_string()))?;

    if !user.active {
        return Err(AppError::Auth("User is deactivated".to_string()));
    }

    let token = encode_jwt(
        user.id,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiry_hours,
    )?;

    tracing::info!(user_id = %user.id, role = %user.role, "Token issued");

    Ok(Json(TokenResponse {
        token,
        user_id: user.id,
        role: user.role,
    }))
}
