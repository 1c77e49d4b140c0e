//! Download completion detection by directory polling.
//!
//! Browser downloads triggered by a click give no completion event we can rely
//! on, so completion is inferred from the filesystem: snapshot the directory
//! before the click, then poll until a new entry appears that has no
//! in-progress marker and whose size held still between two polls.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::types::{DetectedDownload, DownloadError};

/// Suffixes browsers and tools use for files still being written.
pub const IN_PROGRESS_SUFFIXES: &[&str] = &[".crdownload", ".part", ".partial", ".download", ".tmp"];

/// Whether `name` looks like a download that hasn't finished yet.
///
/// Hidden files count as in progress: Chromium stages downloads as
/// `.com.google.Chrome.XXXXXX` before renaming them.
pub fn is_in_progress(name: &str) -> bool {
    if name.starts_with('.') {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    IN_PROGRESS_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// The set of regular-file names in a directory at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    entries: BTreeSet<String>,
}

impl DirectorySnapshot {
    /// Capture the regular files currently in `dir`. Subdirectories are ignored.
    pub async fn capture(dir: &Path) -> std::io::Result<Self> {
        let mut entries = BTreeSet::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                entries.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(Self { entries })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names present now but not in `before`, in lexicographic order.
    pub fn new_entries(&self, before: &DirectorySnapshot) -> Vec<String> {
        self.entries.difference(&before.entries).cloned().collect()
    }
}

/// Polls a directory for a finished download.
#[derive(Debug, Clone)]
pub struct DownloadWatcher {
    timeout: Duration,
    poll_interval: Duration,
}

impl DownloadWatcher {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for a new, finished, size-stable file in `dir` relative to `before`.
    ///
    /// Returns [`DownloadError::Timeout`] when the budget runs out, including
    /// the case where only in-progress files ever showed up. A finished file
    /// first seen on the last poll before the deadline gets one extra poll
    /// to prove its size is stable.
    pub async fn await_new_file(
        &self,
        dir: &Path,
        before: &DirectorySnapshot,
    ) -> Result<DetectedDownload, DownloadError> {
        let deadline = Instant::now() + self.timeout;
        let mut last_sizes: HashMap<String, u64> = HashMap::new();
        let mut settling = false;

        loop {
            let now = DirectorySnapshot::capture(dir).await?;
            let mut sizes = HashMap::new();
            let mut stable = Vec::new();

            for name in now.new_entries(before) {
                if is_in_progress(&name) {
                    continue;
                }
                let size = match tokio::fs::metadata(dir.join(&name)).await {
                    Ok(meta) if meta.is_file() => meta.len(),
                    // Renamed or removed between listing and stat.
                    _ => continue,
                };
                if last_sizes.get(&name) == Some(&size) {
                    stable.push((name.clone(), size));
                }
                sizes.insert(name, size);
            }

            if let Some((filename, size)) = stable.first().cloned() {
                let extra: Vec<String> = stable.into_iter().skip(1).map(|(n, _)| n).collect();
                if !extra.is_empty() {
                    warn!(
                        "Click produced {} files in {}; keeping {} and leaving {:?}",
                        extra.len() + 1,
                        dir.display(),
                        filename,
                        extra
                    );
                }
                debug!("Download finished: {} ({} bytes)", filename, size);
                return Ok(DetectedDownload {
                    filename,
                    size,
                    extra,
                });
            }

            last_sizes = sizes;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                if settling || last_sizes.is_empty() {
                    return Err(DownloadError::Timeout(self.timeout));
                }
                settling = true;
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}
