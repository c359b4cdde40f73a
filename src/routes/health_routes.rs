//! Liveness probe.

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Answers `OK` whenever the process is serving requests.
async fn health_check() -> &'static str {
    "OK"
}
