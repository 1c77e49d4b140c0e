//! Attachment discovery and click-to-download on a documents page.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::browser::{BrowserError, BrowserSession};
use crate::config::Settings;
use crate::models::{AttachmentResult, PageVisitResult};
use crate::services::download::{DirectorySnapshot, DownloadError, DownloadWatcher};
use crate::utils::{display_label, file_url, unique_destination};

/// Why a single attachment produced no file.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("failed to store download: {0}")]
    Io(#[from] std::io::Error),
}

/// Finds the attachment list on a page and downloads each item by clicking it.
#[derive(Debug, Clone)]
pub struct AttachmentLocator {
    item_selector: String,
    link_selector: String,
    item_wait: Duration,
    download_dir: PathBuf,
    public_base_url: String,
    watcher: DownloadWatcher,
}

impl AttachmentLocator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            item_selector: settings.portal.attachment_item_selector.clone(),
            link_selector: settings.portal.attachment_link_selector.clone(),
            item_wait: settings.timing.item_wait(),
            download_dir: settings.download_dir.clone(),
            public_base_url: settings.public_base_url.clone(),
            watcher: DownloadWatcher::new(
                settings.timing.download_timeout(),
                settings.timing.poll_interval(),
            ),
        }
    }

    /// Visit `url` and download every attachment in document order.
    ///
    /// Never fails: navigation problems become a `page_error` visit and
    /// per-item problems are recorded on that item.
    pub async fn visit(&self, session: &mut dyn BrowserSession, url: &str) -> PageVisitResult {
        if let Err(e) = session.navigate(url).await {
            warn!("Could not load {}: {}", url, e);
            return PageVisitResult::page_error(url, e.to_string());
        }

        let count = match session.wait_for_all(&self.item_selector, self.item_wait).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Attachment lookup failed on {}: {}", url, e);
                return PageVisitResult::page_error(url, e.to_string());
            }
        };

        if count == 0 {
            info!("No attachments found on {}", url);
            return PageVisitResult::no_attachments(url);
        }

        info!("Found {} attachments on {}", count, url);
        let mut results = Vec::with_capacity(count);
        for index in 0..count {
            results.push(self.fetch_item(session, index).await);
        }

        let visit = PageVisitResult::completed(url, results);
        info!(
            "Saved {}/{} attachments from {}",
            visit.saved_count(),
            count,
            url
        );
        visit
    }

    async fn fetch_item(&self, session: &mut dyn BrowserSession, index: usize) -> AttachmentResult {
        let position = index + 1;
        let link = match session
            .describe_item(&self.item_selector, index, &self.link_selector)
            .await
        {
            Ok(link) => link,
            Err(e) => {
                warn!("Attachment #{}: {}", position, e);
                let mut result = AttachmentResult::new(position, "", "");
                result.note_error(e.to_string());
                return result;
            }
        };

        let mut result = AttachmentResult::new(position, display_label(&link.text), link.href);
        debug!("Attachment #{}: {:?} ({})", position, result.label, result.href);

        match self.download_item(session, index).await {
            Ok(filename) => {
                result.file_url = Some(file_url(&self.public_base_url, &filename));
                result.saved_file = Some(filename);
            }
            Err(e) => {
                warn!("Attachment #{} ({}): {}", position, result.label, e);
                result.note_error(e.to_string());
            }
        }
        result
    }

    /// Click one item with downloads directed into a fresh attempt directory,
    /// then move the finished file into the download directory.
    async fn download_item(
        &self,
        session: &mut dyn BrowserSession,
        index: usize,
    ) -> Result<String, AttachmentError> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        // Removed with everything left in it (partials, ignored extras) on drop.
        let attempt = tempfile::Builder::new()
            .prefix(".attempt-")
            .tempdir_in(&self.download_dir)?;

        session.set_download_dir(attempt.path()).await?;
        let before = DirectorySnapshot::capture(attempt.path()).await?;
        session
            .click_item(&self.item_selector, index, &self.link_selector)
            .await?;

        let detected = self.watcher.await_new_file(attempt.path(), &before).await?;
        let saved = move_into(attempt.path(), &detected.filename, &self.download_dir).await?;

        for extra in &detected.extra {
            match move_into(attempt.path(), extra, &self.download_dir).await {
                Ok(name) => info!("Kept extra file {} from attachment #{}", name, index + 1),
                Err(e) => warn!("Could not keep extra file {}: {}", extra, e),
            }
        }

        Ok(saved)
    }
}

/// Move `name` from `from` into `to` under a collision-free name.
async fn move_into(from: &Path, name: &str, to: &Path) -> std::io::Result<String> {
    let destination = unique_destination(to, name);
    tokio::fs::rename(from.join(name), &destination).await?;
    Ok(destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VisitStatus;
    use crate::scrapers::browser::LinkInfo;
    use async_trait::async_trait;

    /// Page with fixed items; clicking item `i` writes `files[i]` (if any) into the download dir.
    struct ScriptedPage {
        fail_navigation: bool,
        items: Vec<(&'static str, Option<&'static str>)>,
        download_dir: Option<PathBuf>,
    }

    #[async_trait]
    impl BrowserSession for ScriptedPage {
        async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
            if self.fail_navigation {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                });
            }
            Ok(())
        }

        async fn wait_for_all(&mut self, _: &str, _: Duration) -> Result<usize, BrowserError> {
            Ok(self.items.len())
        }

        async fn text_of(&mut self, _: &str, _: Duration) -> Result<Option<String>, BrowserError> {
            Ok(None)
        }

        async fn describe_item(&mut self, _: &str, index: usize, _: &str) -> Result<LinkInfo, BrowserError> {
            let (text, _) = self.items[index];
            Ok(LinkInfo {
                text: text.to_string(),
                href: format!("https://portal.test/dl/{}", index),
            })
        }

        async fn set_download_dir(&mut self, dir: &Path) -> Result<(), BrowserError> {
            self.download_dir = Some(dir.to_path_buf());
            Ok(())
        }

        async fn click_item(&mut self, _: &str, index: usize, _: &str) -> Result<(), BrowserError> {
            if let (Some(dir), (_, Some(file))) = (&self.download_dir, self.items[index]) {
                std::fs::write(dir.join(file), b"content").unwrap();
            }
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn locator(dir: &Path) -> AttachmentLocator {
        let mut settings = Settings::with_download_dir(dir);
        settings.public_base_url = "https://files.test".to_string();
        let mut locator = AttachmentLocator::new(&settings);
        locator.watcher = DownloadWatcher::new(Duration::from_millis(200), Duration::from_millis(20));
        locator
    }

    #[tokio::test]
    async fn test_visit_saves_each_item_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = ScriptedPage {
            fail_navigation: false,
            items: vec![("Bando.pdf", Some("bando.pdf")), ("Allegato A", Some("allegato.docx"))],
            download_dir: None,
        };

        let visit = locator(dir.path()).visit(&mut page, "https://portal.test/t/1").await;

        assert_eq!(visit.status, VisitStatus::Ok);
        assert_eq!(visit.attachments.len(), 2);
        assert_eq!(visit.attachments[0].index, 1);
        assert_eq!(visit.attachments[0].label, "Bando");
        assert_eq!(visit.attachments[0].saved_file.as_deref(), Some("bando.pdf"));
        assert_eq!(
            visit.attachments[0].file_url.as_deref(),
            Some("https://files.test/files/bando.pdf")
        );
        assert_eq!(visit.attachments[1].saved_file.as_deref(), Some("allegato.docx"));
        assert!(dir.path().join("bando.pdf").exists());

        // Attempt directories are cleaned up.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_missing_download_is_recorded_and_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = ScriptedPage {
            fail_navigation: false,
            items: vec![("Broken", None), ("Works.pdf", Some("works.pdf"))],
            download_dir: None,
        };

        let visit = locator(dir.path()).visit(&mut page, "https://portal.test/t/2").await;

        assert_eq!(visit.attachments.len(), 2);
        assert!(visit.attachments[0].saved_file.is_none());
        assert!(visit.attachments[0]
            .error
            .as_deref()
            .unwrap()
            .contains("no new file"));
        assert_eq!(visit.attachments[1].saved_file.as_deref(), Some("works.pdf"));
    }

    #[tokio::test]
    async fn test_existing_name_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.pdf"), b"earlier").unwrap();
        let mut page = ScriptedPage {
            fail_navigation: false,
            items: vec![("doc.pdf", Some("doc.pdf"))],
            download_dir: None,
        };

        let visit = locator(dir.path()).visit(&mut page, "https://portal.test/t/3").await;

        assert_eq!(visit.attachments[0].saved_file.as_deref(), Some("doc (1).pdf"));
        assert_eq!(std::fs::read(dir.path().join("doc.pdf")).unwrap(), b"earlier");
    }

    #[tokio::test]
    async fn test_no_items_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = ScriptedPage {
            fail_navigation: false,
            items: Vec::new(),
            download_dir: None,
        };

        let visit = locator(dir.path()).visit(&mut page, "https://portal.test/t/4").await;
        assert_eq!(visit.status, VisitStatus::NoAttachments);
        assert!(visit.attachments.is_empty());
    }

    #[tokio::test]
    async fn test_navigation_failure_is_page_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = ScriptedPage {
            fail_navigation: true,
            items: vec![("x", Some("x.pdf"))],
            download_dir: None,
        };

        let visit = locator(dir.path()).visit(&mut page, "https://portal.test/t/5").await;
        assert_eq!(visit.status, VisitStatus::PageError);
        assert_eq!(visit.attachments.len(), 1);
        assert!(visit.attachments[0].error.as_deref().unwrap().contains("ERR_NAME_NOT_RESOLVED"));
    }
}
