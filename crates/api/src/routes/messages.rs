//! Direct single-channel message routes.
//!
//! These bypass recipient resolution and the template registry: the caller
//! supplies a channel-specific address and a finished message body. Used
//! by other services for ad-hoc operational messages.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use herald_channels::SendMeta;
use herald_common::error::AppError;
use herald_common::types::{Channel, Markup};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/messages/chat", post(send_chat))
        .route("/api/messages/email", post(send_email))
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub chat_id: i64,
    pub text: String,
    #[serde(default)]
    pub markup: Markup,
}

#[derive(Debug, Deserialize)]
pub struct EmailMessageRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub html: bool,
}

/// POST /api/messages/chat — Send one chat message to one chat id.
async fn send_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChatMessageRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::Validation("Message text is required".to_string()));
    }

    let sender = state.channels.get(Channel::Telegram).ok_or_else(|| {
        AppError::ChannelNotConfigured("chat channel is not registered".to_string())
    })?;

    let meta = SendMeta {
        subject: None,
        markup: req.markup,
    };
    sender
        .send(&req.chat_id.to_string(), &req.text, &meta)
        .await?;

    tracing::info!(user_id = %auth.user_id, chat_id = req.chat_id, "Direct chat message sent");
    Ok(Json(json!({ "sent": true })))
}

/// POST /api/messages/email — Send one email to one address.
async fn send_email(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<EmailMessageRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !req.to.contains('@') {
        return Err(AppError::Validation(format!(
            "Invalid email address '{}'",
            req.to
        )));
    }
    if req.body.trim().is_empty() {
        return Err(AppError::Validation("Message body is required".to_string()));
    }

    let sender = state.channels.get(Channel::Email).ok_or_else(|| {
        AppError::ChannelNotConfigured("email channel is not registered".to_string())
    })?;

    let meta = SendMeta {
        subject: Some(req.subject.clone()),
        markup: if req.html { Markup::Html } else { Markup::Plain },
    };
    sender.send(&req.to, &req.body, &meta).await?;

    tracing::info!(user_id = %auth.user_id, to = %req.to, "Direct email sent");
    Ok(Json(json!({ "sent": true })))
}
