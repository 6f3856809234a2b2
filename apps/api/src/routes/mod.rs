pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::screening::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // AI screening API
        .route(
            "/api/v1/ai-screening/analyze",
            post(handlers::handle_analyze).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/ai-screening/analyze-existing",
            post(handlers::handle_analyze_existing),
        )
        .route(
            "/api/v1/ai-screening/health",
            get(handlers::handle_model_health),
        )
        .with_state(state)
}
