use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Controls
        .route("/controls", get(handlers::get_controls))
        .route(
            "/controls/start-recording",
            post(handlers::start_recording),
        )
        .route("/controls/stop-recording", post(handlers::stop_recording))
        // Session queries
        .route("/session", get(handlers::get_session))
        .route("/capability", get(handlers::get_capability))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
