//! HTTP request handlers.

mod files;
mod health;
mod jobs;
mod scrape;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

pub use files::{delete_file, list_files, serve_file};
pub use health::health;
pub use jobs::job_status;
pub use scrape::{analyze, scrape, submit_announcements};

/// JSON error body: `{"status": "error", "error": message}`.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({
            "status": "error",
            "error": message.into(),
        })),
    )
        .into_response()
}
