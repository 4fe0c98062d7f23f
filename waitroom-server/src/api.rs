//! API routes definition

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Queue routes
        .route("/api/v1/queue", post(handlers::register_user))
        .route("/api/v1/queue/allow", post(handlers::allow_users))
        .route("/api/v1/queue/allowed", get(handlers::is_allowed))
        .route("/api/v1/queue/rank", get(handlers::get_rank))
        .route("/api/v1/queue/touch", get(handlers::touch))
        // Health
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        // State
        .with_state(state)
}
