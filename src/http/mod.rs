//! HTTP transport (spec §10.1): `POST /execute` and `GET /health`.

mod execute;
mod health;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::session::SessionManager;

/// Shared application state passed to every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub start_time: Instant,
}

/// Assemble the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(execute::execute))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
