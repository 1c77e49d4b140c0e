//! Headless browser sessions for attachment pages.
//!
//! Every unit of work (one page visit or one category filter pass) gets its
//! own session from a [`SessionProvider`]. Callers acquire, use, then call
//! [`BrowserSession::close`] without early returns in between; dropping a
//! session kills the browser as a backstop for panics.

mod binary;
#[cfg(feature = "browser")]
mod chrome;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use binary::find_chrome;
#[cfg(feature = "browser")]
pub use chrome::{ChromeLauncher, ChromeSession};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser support not compiled. Rebuild with: cargo build --features browser")]
    NotCompiled,
    #[error("Chrome/Chromium not found: {0}")]
    NotFound(String),
    #[error("failed to start browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("navigation to {url} timed out after {}s", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },
    #[error("element not found: {0}")]
    Element(String),
    #[error("browser command failed: {0}")]
    Command(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Visible text and link target of one attachment item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInfo {
    pub text: String,
    pub href: String,
}

/// One isolated browser for one unit of work.
///
/// Item indices are 0-based positions in document order of `item_selector` matches.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url` within the session's page-load budget.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Wait up to `timeout` for `selector` to match. Returns the match count, 0 on timeout.
    async fn wait_for_all(&mut self, selector: &str, timeout: Duration)
        -> Result<usize, BrowserError>;

    /// Visible text of the first `selector` match, or `None` if it never appeared.
    async fn text_of(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BrowserError>;

    /// Text and href of the link inside the `index`th item.
    async fn describe_item(
        &mut self,
        item_selector: &str,
        index: usize,
        link_selector: &str,
    ) -> Result<LinkInfo, BrowserError>;

    /// Direct subsequent downloads into `dir`.
    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), BrowserError>;

    /// Scroll the `index`th item's link into view and click it.
    async fn click_item(
        &mut self,
        item_selector: &str,
        index: usize,
        link_selector: &str,
    ) -> Result<(), BrowserError>;

    /// Release the browser. Idempotent; failures are logged, not returned.
    async fn close(&mut self);
}

/// Hands out fresh sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromeLauncher {
    settings: crate::config::BrowserSettings,
}

#[cfg(not(feature = "browser"))]
impl ChromeLauncher {
    pub fn new(settings: crate::config::BrowserSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &crate::config::BrowserSettings {
        &self.settings
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionProvider for ChromeLauncher {
    async fn acquire(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        Err(BrowserError::NotCompiled)
    }
}
