//! Listing, serving and deleting downloaded files.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::super::schema::DeleteBody;
use super::super::AppState;
use super::error_response;
use crate::utils::{basename_from_reference, file_url};

#[derive(Debug, Serialize)]
struct FileEntry {
    filename: String,
    size: u64,
    file_url: String,
}

/// `GET /files`: downloaded files, sorted by name. In-flight attempt
/// directories and hidden files are not listed.
pub async fn list_files(State(state): State<AppState>) -> Response {
    let mut read_dir = match tokio::fs::read_dir(&state.settings.download_dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Json(Vec::<FileEntry>::new()).into_response()
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut entries = Vec::new();
    loop {
        let entry = match read_dir.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        let filename = entry.file_name().to_string_lossy().into_owned();
        if filename.starts_with('.') {
            continue;
        }
        match entry.metadata().await {
            Ok(meta) if meta.is_file() => entries.push(FileEntry {
                file_url: file_url(&state.settings.public_base_url, &filename),
                filename,
                size: meta.len(),
            }),
            _ => continue,
        }
    }
    entries.sort_by(|a, b| a.filename.cmp(&b.filename));

    Json(entries).into_response()
}

/// `GET /files/*path`: serve a downloaded file.
pub async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let canonical_dir = match state.settings.download_dir.canonicalize() {
        Ok(p) => p,
        Err(_) => return (StatusCode::NOT_FOUND, "File not found").into_response(),
    };

    if !is_relative_within(&path) {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    }

    let canonical_file = match canonical_dir.join(&path).canonicalize() {
        Ok(p) => p,
        Err(_) => return (StatusCode::NOT_FOUND, "File not found").into_response(),
    };

    if !canonical_file.starts_with(&canonical_dir) || !canonical_file.is_file() {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    }

    let content = match tokio::fs::read(&canonical_file).await {
        Ok(c) => c,
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response();
        }
    };

    let mime = mime_guess::from_path(&canonical_file)
        .first_or_octet_stream()
        .to_string();

    ([(header::CONTENT_TYPE, mime)], content).into_response()
}

/// True when `path` has no root and no `..` component. Names that merely
/// contain dots, like `offerta..pdf`, are fine.
fn is_relative_within(path: &str) -> bool {
    use std::path::Component;

    std::path::Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// `POST /delete_file`: delete files by name or by previously issued URL.
pub async fn delete_file(
    State(state): State<AppState>,
    body: Result<Json<DeleteBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let references = body.references();
    if references.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no filename or filenames given");
    }

    let mut deleted = Vec::new();
    let mut not_found = Vec::new();

    for reference in references {
        let Some(name) = basename_from_reference(&reference) else {
            not_found.push(reference);
            continue;
        };
        let path = state.settings.download_dir.join(&name);
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            not_found.push(name);
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted {}", path.display());
                deleted.push(name);
            }
            Err(e) => {
                warn!("Could not delete {}: {}", path.display(), e);
                not_found.push(name);
            }
        }
    }

    if deleted.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "not_found",
                "deleted": deleted,
                "not_found": not_found,
            })),
        )
            .into_response();
    }

    Json(json!({
        "status": "ok",
        "deleted": deleted,
        "not_found": not_found,
    }))
    .into_response()
}
