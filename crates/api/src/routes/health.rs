//! Health check endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let email_configured =
        state.config.email_address.is_some() && state.config.email_password.is_some();

    Json(json!({
        "status": "ok",
        "service": "prescripto-api",
        "version": env!("CARGO_PKG_VERSION"),
        "email_configured": email_configured
    }))
}
