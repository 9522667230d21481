//! Manual scan trigger routes.
//!
//! Privileged operators can force an out-of-cycle pass of any scan
//! routine. This calls the exact same routine methods the interval
//! scheduler uses — no separate code path.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};

use herald_common::error::AppError;
use herald_scanner::scans::{RoutineKind, ScanError, ScanReport};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/scans/{routine}/run", post(run_scan))
}

/// POST /api/scans/:routine/run — Run one scan routine synchronously.
async fn run_scan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(routine): Path<String>,
) -> Result<Json<ScanReport>, AppError> {
    auth.require_admin()?;

    let routine: RoutineKind = routine.parse().map_err(AppError::Validation)?;

    let report = state.scans.run_routine(routine).await.map_err(|e| match e {
        ScanError::InProgress(_) => AppError::Conflict(e.to_string()),
        ScanError::Store(e) => AppError::Store(e),
    })?;

    tracing::info!(
        user_id = %auth.user_id,
        routine = %report.routine,
        findings = report.findings,
        "Manual scan completed"
    );

    Ok(Json(report))
}
