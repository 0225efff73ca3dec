//! Shared application state for the Axum API server.

use prescripto_common::config::AppConfig;
use prescripto_notifier::Dispatcher;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, config: AppConfig) -> Self {
        Self { dispatcher, config }
    }
}
