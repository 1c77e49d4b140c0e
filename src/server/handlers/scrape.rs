//! Job submission endpoints. They validate, enqueue and acknowledge; the
//! work itself happens on the job worker.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

use super::super::schema::{is_http_url, parse_analyze, parse_batch, ScrapeBody};
use super::super::AppState;
use super::error_response;
use crate::services::ScrapeRequest;

/// `POST /scrape`: scrape one or more documents URLs.
pub async fn scrape(
    State(state): State<AppState>,
    body: Result<Json<ScrapeBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let webhook_url = body.webhook_url.clone().filter(|u| !u.trim().is_empty());

    let (urls, rejected): (Vec<String>, Vec<String>) =
        body.all_urls().into_iter().partition(|u| is_http_url(u));
    if !rejected.is_empty() {
        warn!("Ignoring invalid URLs: {:?}", rejected);
    }
    if urls.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no valid http(s) URL given");
    }

    enqueue(&state, ScrapeRequest::Urls { urls, webhook_url }).await
}

/// `POST /announcements`: category-filter then scrape a batch of records.
pub async fn submit_announcements(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let batch = match parse_batch(body) {
        Ok(batch) => batch,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    if batch.announcements.is_empty() {
        return (StatusCode::OK, Json(json!({ "status": "empty" }))).into_response();
    }

    let base_url = &state.settings.portal.base_url;
    let announcements = batch
        .announcements
        .into_iter()
        .map(|mut a| {
            a.resolve_documents_url(base_url);
            a
        })
        .collect();

    enqueue(
        &state,
        ScrapeRequest::Batch {
            announcements,
            webhook_url: batch.webhook_url,
        },
    )
    .await
}

/// `POST /analyze`: fetch attachment links that are already known.
pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let request = match parse_analyze(body) {
        Ok(request) => request,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let links: Vec<String> = request.links.into_iter().filter(|l| is_http_url(l)).collect();
    if links.is_empty() {
        return (StatusCode::OK, Json(json!({ "status": "no_links" }))).into_response();
    }

    enqueue(
        &state,
        ScrapeRequest::DirectLinks {
            announcement: request.announcement,
            links,
            webhook_url: request.webhook_url,
        },
    )
    .await
}

async fn enqueue(state: &AppState, request: ScrapeRequest) -> Response {
    match state.queue.submit(request).await {
        Ok(record) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "processing",
                "job_id": record.id,
                "urls": record.targets,
            })),
        )
            .into_response(),
        Err(e) => {
            warn!("Rejecting request: {}", e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}
