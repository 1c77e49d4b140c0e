//! Remote file store uploads.
//!
//! The pipeline only sees [`RemoteFileStore`]; the Gemini Files API is the
//! one implementation. No store is built at all without an API key.

mod gemini;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::GeminiFileStore;

use crate::models::RemoteFile;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload rejected with HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected upload response: {0}")]
    Response(String),
}

#[async_trait]
pub trait RemoteFileStore: Send + Sync {
    /// Upload `path` under `display_name`. The MIME type is guessed from the
    /// extension when not given.
    async fn upload(
        &self,
        path: &Path,
        display_name: &str,
        mime_type: Option<&str>,
    ) -> Result<RemoteFile, UploadError>;
}
