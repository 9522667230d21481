//! Typed notification dispatch, broadcast, history and statistics routes.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::store::HistoryFilter;
use herald_common::types::{
    Channel, DispatchResult, NotificationKind, NotificationRecord, NotificationStats, Role,
};
use herald_engine::dispatcher::{DispatchError, DispatchOptions};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(dispatch_notification))
        .route("/api/notifications", get(notification_history))
        .route("/api/notifications/broadcast", post(broadcast))
        .route("/api/notifications/stats", get(notification_stats))
}

fn dispatch_error_to_app(err: DispatchError) -> AppError {
    match err {
        DispatchError::UnknownKind(_)
        | DispatchError::NoRecipients
        | DispatchError::UnsupportedChannel(_, _) => AppError::Validation(err.to_string()),
        DispatchError::Store(e) => AppError::Store(e),
    }
}

/// Request body for a typed notification dispatch.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    /// Notification kind wire name, e.g. "low_stock"
    pub kind: String,
    pub recipients: Vec<Uuid>,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Optional restriction to a subset of the kind's default channels
    pub channels: Option<Vec<Channel>>,
}

/// POST /api/notifications — Dispatch a typed notification.
///
/// Partial delivery failure is still a 200: the operation completed, the
/// per-attempt detail carries the outcome. Only argument errors are 4xx.
async fn dispatch_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<NotifyRequest>,
) -> Result<Json<DispatchResult>, AppError> {
    let result = state
        .dispatcher
        .dispatch_by_name(
            &req.kind,
            &req.recipients,
            req.payload,
            DispatchOptions {
                channels: req.channels,
            },
        )
        .await
        .map_err(dispatch_error_to_app)?;

    tracing::info!(
        user_id = %auth.user_id,
        kind = %req.kind,
        notification_id = %result.notification_id,
        overall_success = result.overall_success,
        "Notification dispatched via API"
    );

    Ok(Json(result))
}

/// Request body for a broadcast.
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub title: String,
    pub message: String,
    pub channels: Vec<Channel>,
    /// Restrict to users holding any of these roles; all active users
    /// otherwise.
    pub roles: Option<Vec<Role>>,
}

/// POST /api/notifications/broadcast — Admin-only fan-out of a system
/// alert to a filtered user set.
async fn broadcast(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<BroadcastRequest>,
) -> Result<Json<DispatchResult>, AppError> {
    auth.require_admin()?;

    let users = match &req.roles {
        Some(roles) => state.store.users_by_roles(roles).await?,
        None => state.store.active_users().await?,
    };
    let recipients: Vec<Uuid> = users.into_iter().map(|u| u.id).collect();

    let payload = serde_json::json!({
        "title": req.title,
        "message": req.message,
    });
    let result = state
        .dispatcher
        .dispatch(
            NotificationKind::SystemAlert,
            &recipients,
            payload,
            DispatchOptions {
                channels: Some(req.channels),
            },
        )
        .await
        .map_err(dispatch_error_to_app)?;

    tracing::info!(
        user_id = %auth.user_id,
        recipients = result.attempts.len(),
        notification_id = %result.notification_id,
        "Broadcast dispatched"
    );

    Ok(Json(result))
}

/// Query parameters for notification history.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub channel: Option<Channel>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// GET /api/notifications — Notification history with channel/date
/// filters. Non-privileged callers only see records addressed to them.
async fn notification_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<NotificationRecord>>, AppError> {
    let filter = HistoryFilter {
        channel: params.channel,
        from: params.from,
        to: params.to,
        recipient: (!auth.is_privileged()).then_some(auth.user_id),
        limit: params
            .limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT),
    };

    let records = state.store.notification_history(&filter).await?;
    Ok(Json(records))
}

/// Query parameters for notification statistics.
#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// GET /api/notifications/stats — Counts by kind/status over a window
/// (default: the last 30 days). Fleet-wide data, so privileged only.
async fn notification_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<StatsParams>,
) -> Result<Json<NotificationStats>, AppError> {
    if !auth.is_privileged() {
        return Err(AppError::Forbidden(
            "manager or admin role required".to_string(),
        ));
    }

    let to = params.to.unwrap_or_else(Utc::now);
    let from = params.from.unwrap_or_else(|| to - Duration::days(30));

    let stats = state.store.notification_stats(from, to).await?;
    Ok(Json(stats))
}
