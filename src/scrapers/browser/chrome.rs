//! Chromium sessions over the DevTools protocol.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{find_chrome, BrowserError, BrowserSession, LinkInfo, SessionProvider};
use crate::config::BrowserSettings;

/// How often element waits re-query the DOM.
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// JavaScript to wait for page ready state.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

const SCRIPTED_CLICK: &str = "function() { this.click(); }";

impl From<CdpError> for BrowserError {
    fn from(e: CdpError) -> Self {
        BrowserError::Command(e.to_string())
    }
}

/// Launches (or connects to) a fresh Chromium for every session.
pub struct ChromeLauncher {
    settings: BrowserSettings,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }
}

#[async_trait]
impl SessionProvider for ChromeLauncher {
    async fn acquire(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let session = match self.settings.remote_url.as_deref() {
            Some(url) => ChromeSession::connect(url, &self.settings).await?,
            None => ChromeSession::launch(&self.settings).await?,
        };
        Ok(Box::new(session))
    }
}

/// One browser with a single page.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    page_load_timeout: Duration,
    /// Remote browsers are shared; only our page is closed on release.
    remote: bool,
    closed: bool,
    // Dropped after the browser so Chrome is gone before its profile is removed.
    _profile: Option<TempDir>,
}

impl ChromeSession {
    /// Start a local headless Chromium with a throwaway profile.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, BrowserError> {
        let chrome_path = find_chrome(settings.chrome_bin.as_deref())?;
        let profile = tempfile::Builder::new()
            .prefix("tenderscrape-profile-")
            .tempdir()?;

        info!(
            "Launching browser {} (headless={})",
            chrome_path.display(),
            settings.headless
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(profile.path())
            .request_timeout(settings.page_load_timeout())
            .window_size(settings.window_width, settings.window_height)
            .viewport(Viewport {
                width: settings.window_width,
                height: settings.window_height,
                ..Default::default()
            });

        // with_head means NOT headless
        if !settings.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        for arg in &settings.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(BrowserError::Launch(e.to_string()));
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
            page_load_timeout: settings.page_load_timeout(),
            remote: false,
            closed: false,
            _profile: Some(profile),
        })
    }

    /// Attach to a remote DevTools endpoint and open a new page there.
    pub async fn connect(url: &str, settings: &BrowserSettings) -> Result<Self, BrowserError> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(settings.page_load_timeout())
            .send()
            .await
            .map_err(|e| BrowserError::Launch(format!("remote browser unreachable: {}", e)))?
            .json()
            .await
            .map_err(|e| BrowserError::Launch(format!("bad browser version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BrowserError::Launch("no webSocketDebuggerUrl in response".into()))?;

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: settings.page_load_timeout(),
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(BrowserError::Launch(e.to_string()));
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
            page_load_timeout: settings.page_load_timeout(),
            remote: true,
            closed: false,
            _profile: None,
        })
    }

    async fn wait_for_page_ready(&self) {
        match tokio::time::timeout(
            self.page_load_timeout,
            self.page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }
    }

    async fn item_link(
        &self,
        item_selector: &str,
        index: usize,
        link_selector: &str,
    ) -> Result<Element, BrowserError> {
        let items = self.page.find_elements(item_selector).await?;
        let item = items.into_iter().nth(index).ok_or_else(|| {
            BrowserError::Element(format!("{} #{}", item_selector, index + 1))
        })?;
        item.find_element(link_selector)
            .await
            .map_err(|_| BrowserError::Element(format!("{} in item #{}", link_selector, index + 1)))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        info!("Navigating to {}", url);
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|message| BrowserError::Navigation {
                url: url.to_string(),
                message,
            })?;

        let response = tokio::time::timeout(self.page_load_timeout, self.page.execute(params))
            .await
            .map_err(|_| BrowserError::Timeout {
                url: url.to_string(),
                timeout: self.page_load_timeout,
            })?
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if let Some(message) = response.result.error_text.clone() {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message,
            });
        }

        self.wait_for_page_ready().await;
        Ok(())
    }

    async fn wait_for_all(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<usize, BrowserError> {
        let start = Instant::now();
        loop {
            if let Ok(elements) = self.page.find_elements(selector).await {
                if !elements.is_empty() {
                    return Ok(elements.len());
                }
            }
            if start.elapsed() >= timeout {
                debug!("No match for {} after {:?}", selector, timeout);
                return Ok(0);
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    async fn text_of(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BrowserError> {
        if self.wait_for_all(selector, timeout).await? == 0 {
            return Ok(None);
        }
        let element = self.page.find_element(selector).await?;
        Ok(element.inner_text().await?)
    }

    async fn describe_item(
        &mut self,
        item_selector: &str,
        index: usize,
        link_selector: &str,
    ) -> Result<LinkInfo, BrowserError> {
        let link = self.item_link(item_selector, index, link_selector).await?;
        let text = link.inner_text().await?.unwrap_or_default();
        let href = link.attribute("href").await?.unwrap_or_default();
        Ok(LinkInfo { text, href })
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), BrowserError> {
        // Chrome requires an absolute path.
        let dir = tokio::fs::canonicalize(dir).await?;
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().into_owned())
            .build()
            .map_err(BrowserError::Command)?;
        self.browser.execute(params).await?;
        debug!("Downloads directed to {}", dir.display());
        Ok(())
    }

    async fn click_item(
        &mut self,
        item_selector: &str,
        index: usize,
        link_selector: &str,
    ) -> Result<(), BrowserError> {
        let link = self.item_link(item_selector, index, link_selector).await?;
        if let Err(e) = link.scroll_into_view().await {
            debug!("scrollIntoView failed for item #{}: {}", index + 1, e);
        }

        match link.click().await {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!(
                    "Direct click failed for item #{} ({}); using scripted click",
                    index + 1,
                    e
                );
                link.call_js_fn(SCRIPTED_CLICK, false).await?;
                Ok(())
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.page.clone().close().await {
            debug!("Page close failed: {}", e);
        }
        if !self.remote {
            if let Err(e) = self.browser.close().await {
                warn!("Browser close failed: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                warn!("Browser did not exit cleanly: {}", e);
            }
        }
        self.handler.abort();
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Browser session dropped without close; killing it");
        }
        // Browser's own Drop kills a launched child process.
        self.handler.abort();
    }
}
