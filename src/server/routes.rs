//! Router configuration for the HTTP server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Job submission
        .route("/scrape", post(handlers::scrape))
        .route("/announcements", post(handlers::submit_announcements))
        .route("/analyze", post(handlers::analyze))
        .route("/jobs/:id", get(handlers::job_status))
        // Downloaded files
        .route("/files", get(handlers::list_files))
        .route("/files/*path", get(handlers::serve_file))
        .route("/delete_file", post(handlers::delete_file))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
