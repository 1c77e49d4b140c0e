use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use super::super::AppState;

/// `GET /jobs/:id`
pub async fn job_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let record = match Uuid::parse_str(&id) {
        Ok(id) => state.queue.registry().get(id).await,
        Err(_) => None,
    };
    match record {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "not_found", "job_id": id })),
        )
            .into_response(),
    }
}
