//! Fakes shared by the integration tests: a scripted portal served through
//! the browser traits, and stand-ins for `openssl` and LibreOffice.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tenderscrape::config::Settings;
use tenderscrape::scrapers::{BrowserError, BrowserSession, LinkInfo, SessionProvider};
use tenderscrape::services::postprocess::{
    converted_output_path, envelope_output_path, DocumentConverter, EnvelopeVerifier, ToolError,
};
use tenderscrape::utils::unique_destination;

/// One attachment item: visible text and the file the click produces.
#[derive(Clone)]
pub struct FakeItem {
    pub text: String,
    pub download: Option<(String, Vec<u8>)>,
}

impl FakeItem {
    pub fn file(text: &str, filename: &str, content: &[u8]) -> Self {
        Self {
            text: text.to_string(),
            download: Some((filename.to_string(), content.to_vec())),
        }
    }
}

/// Pages and category labels keyed by URL.
#[derive(Default)]
pub struct FakePortal {
    pages: HashMap<String, Vec<FakeItem>>,
    labels: HashMap<String, String>,
    pub acquired: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakePortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, items: Vec<FakeItem>) -> Self {
        self.pages.insert(url.to_string(), items);
        self
    }

    pub fn with_label(mut self, url: &str, label: &str) -> Self {
        self.labels.insert(url.to_string(), label.to_string());
        self
    }
}

pub struct FakeProvider {
    pub portal: Arc<FakePortal>,
}

impl FakeProvider {
    pub fn new(portal: FakePortal) -> Self {
        Self {
            portal: Arc::new(portal),
        }
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn acquire(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.portal.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            portal: self.portal.clone(),
            current: None,
            download_dir: None,
            closed: false,
        }))
    }
}

/// Provider whose browser never starts.
pub struct BrokenProvider;

#[async_trait]
impl SessionProvider for BrokenProvider {
    async fn acquire(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        Err(BrowserError::Launch("no display".to_string()))
    }
}

pub struct FakeSession {
    portal: Arc<FakePortal>,
    current: Option<String>,
    download_dir: Option<PathBuf>,
    closed: bool,
}

impl FakeSession {
    fn items(&self) -> &[FakeItem] {
        self.current
            .as_ref()
            .and_then(|url| self.portal.pages.get(url))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        if !self.portal.pages.contains_key(url) && !self.portal.labels.contains_key(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "net::ERR_HTTP_RESPONSE_CODE_FAILURE".to_string(),
            });
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_all(&mut self, _: &str, _: Duration) -> Result<usize, BrowserError> {
        Ok(self.items().len())
    }

    async fn text_of(&mut self, _: &str, _: Duration) -> Result<Option<String>, BrowserError> {
        Ok(self
            .current
            .as_ref()
            .and_then(|url| self.portal.labels.get(url))
            .cloned())
    }

    async fn describe_item(
        &mut self,
        _: &str,
        index: usize,
        _: &str,
    ) -> Result<LinkInfo, BrowserError> {
        let item = self
            .items()
            .get(index)
            .ok_or_else(|| BrowserError::Element(format!("item {}", index)))?;
        Ok(LinkInfo {
            text: item.text.clone(),
            href: format!("#attachment-{}", index),
        })
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), BrowserError> {
        self.download_dir = Some(dir.to_path_buf());
        Ok(())
    }

    async fn click_item(&mut self, _: &str, index: usize, _: &str) -> Result<(), BrowserError> {
        let item = self
            .items()
            .get(index)
            .cloned()
            .ok_or_else(|| BrowserError::Element(format!("item {}", index)))?;
        if let (Some((name, content)), Some(dir)) = (item.download, &self.download_dir) {
            tokio::fs::write(dir.join(name), content).await?;
        }
        Ok(())
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.portal.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Place `preferred` without replacing a file already in its directory.
fn free_path(preferred: &Path) -> PathBuf {
    let dir = preferred.parent().unwrap();
    let name = preferred.file_name().unwrap().to_string_lossy();
    unique_destination(dir, &name)
}

/// Writes the envelope payload next to the input, like `openssl smime -verify`.
pub struct FakeVerifier;

#[async_trait]
impl EnvelopeVerifier for FakeVerifier {
    async fn verify(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let output = free_path(&envelope_output_path(path));
        tokio::fs::write(&output, b"%PDF-1.4 payload").await?;
        Ok(output)
    }

    fn is_available(&self) -> bool {
        true
    }
}

pub struct FakeConverter;

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn convert(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let output = free_path(&converted_output_path(path));
        tokio::fs::write(&output, b"%PDF-1.4 converted").await?;
        Ok(output)
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Settings pointing at `dir`, with fast polling.
pub fn test_settings(dir: &Path) -> Settings {
    let mut settings = Settings::with_download_dir(dir);
    settings.public_base_url = "https://files.test".to_string();
    settings.portal.base_url = "https://portal.test".to_string();
    settings.timing.poll_interval_ms = 20;
    settings.timing.item_wait = 1;
    settings.timing.category_wait = 1;
    settings
}

/// Names of regular files in `dir`, sorted.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Local webhook receiver that records every JSON body it is sent.
pub struct WebhookSink {
    pub url: String,
    received: Arc<tokio::sync::Mutex<Vec<serde_json::Value>>>,
}

impl WebhookSink {
    pub async fn start() -> Self {
        use axum::{routing::post, Router};

        let received = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/hook", post(record_payload))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{}/hook", addr),
            received,
        }
    }

    pub async fn payloads(&self) -> Vec<serde_json::Value> {
        self.received.lock().await.clone()
    }
}

async fn record_payload(
    axum::extract::State(received): axum::extract::State<
        Arc<tokio::sync::Mutex<Vec<serde_json::Value>>>,
    >,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> axum::http::StatusCode {
    received.lock().await.push(body);
    axum::http::StatusCode::OK
}
