pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::evaluation::handlers as evaluation;
use crate::state::AppState;
use crate::upload::handlers as upload;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/upload", post(upload::handle_upload))
        .route("/api/evaluate", post(evaluation::handle_evaluate))
        .route("/api/result/:id", get(evaluation::handle_result))
        .with_state(state)
}
