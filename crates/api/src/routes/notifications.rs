//! Notification routes.
//!
//! Queuing an email always succeeds once the request validates: delivery runs
//! in the background and its outcome is only visible through the stats.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use prescripto_common::error::AppError;
use prescripto_common::types::MessageRequest;
use prescripto_notifier::StatsSnapshot;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications/email", post(send_email))
        .route("/api/notifications/stats", get(stats))
}

/// POST /api/notifications/email — Validate and queue an email.
async fn send_email(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    state.dispatcher.dispatch(request)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "queued": true }))))
}

/// GET /api/notifications/stats — Delivery counters since process start.
async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.dispatcher.stats().snapshot())
}
