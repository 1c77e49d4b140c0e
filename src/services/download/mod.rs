//! Getting attachment files onto disk.
//!
//! Browser-initiated downloads are observed with [`DownloadWatcher`]; plain
//! links are streamed directly with [`LinkFetcher`].

mod http;
mod types;
mod watcher;

pub use http::LinkFetcher;
pub use types::{DetectedDownload, DownloadError, FetchError};
pub use watcher::{is_in_progress, DirectorySnapshot, DownloadWatcher, IN_PROGRESS_SUFFIXES};
