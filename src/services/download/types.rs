//! Download service types and errors.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("no new file detected within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("download directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// A finished download found by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedDownload {
    /// Filename (relative to the watched directory) taken as the result.
    pub filename: String,
    pub size: u64,
    /// Other finished files that appeared in the same poll.
    pub extra: Vec<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to write file: {0}")]
    Io(#[from] std::io::Error),
}
