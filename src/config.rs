//! Configuration management for tenderscrape.
//!
//! Settings are built once at startup from three layers, later layers winning:
//! built-in defaults (suitable for a container), an optional TOML file, and
//! environment variables. The resulting [`Settings`] value is passed into every
//! component constructor; nothing reads configuration from globals.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default download directory inside the container image.
pub const DEFAULT_DOWNLOAD_DIR: &str = "/app/downloads";

/// Default bind address for the HTTP server.
pub const DEFAULT_BIND: &str = "0.0.0.0:5000";

/// Gemini Files API multipart upload endpoint.
pub const GEMINI_UPLOAD_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta/files";

/// Category prefixes (CPV divisions) accepted by the category filter.
pub const DEFAULT_CATEGORY_WHITELIST: &[&str] = &["30", "32", "48", "50", "51", "64", "72", "79"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chrome/Chromium executable. Auto-detected when unset.
    pub chrome_bin: Option<PathBuf>,
    /// Accepted for deployment compatibility; CDP does not need a driver.
    pub chromedriver_path: Option<PathBuf>,
    /// Remote DevTools endpoint (e.g. "ws://chrome:9222"). Launches locally when unset.
    pub remote_url: Option<String>,
    /// Run in headless mode (default: true).
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Page load budget in seconds.
    pub page_load_timeout: u64,
    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_bin: None,
            chromedriver_path: None,
            remote_url: None,
            headless: true,
            window_width: 1366,
            window_height: 900,
            page_load_timeout: 30,
            chrome_args: Vec::new(),
        }
    }
}

impl BrowserSettings {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout)
    }
}

/// Fixed page structure of the procurement portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    /// Base URL used to derive documents URLs from announcement ids.
    pub base_url: String,
    /// Repeated list item representing one attachment.
    pub attachment_item_selector: String,
    /// Clickable link inside an attachment item.
    pub attachment_link_selector: String,
    /// Element holding the "<code>. <description>" classification text.
    pub category_label_selector: String,
    /// Appended to the documents URL to reach the classification page.
    pub category_path_suffix: String,
    /// Accepted two-character category prefixes.
    pub category_whitelist: Vec<String>,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            base_url: "https://appalti.portale.example".to_string(),
            attachment_item_selector: "ul.list-attachments li.list-group-item".to_string(),
            attachment_link_selector: "a".to_string(),
            category_label_selector: "span.cpv-label".to_string(),
            category_path_suffix: "/categories".to_string(),
            category_whitelist: DEFAULT_CATEGORY_WHITELIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Wait budgets for the scraping loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// How long to wait for attachment list items to appear (seconds).
    pub item_wait: u64,
    /// How long to wait for the classification label (seconds).
    pub category_wait: u64,
    /// Download completion budget per attachment (seconds, clamped to 10..=30).
    pub download_timeout: u64,
    /// Download directory poll interval (milliseconds).
    pub poll_interval_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            item_wait: 15,
            category_wait: 20,
            download_timeout: 20,
            poll_interval_ms: 500,
        }
    }
}

impl TimingSettings {
    pub fn item_wait(&self) -> Duration {
        Duration::from_secs(self.item_wait)
    }

    pub fn category_wait(&self) -> Duration {
        Duration::from_secs(self.category_wait)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout.clamp(10, 30))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

/// External document tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub openssl_bin: PathBuf,
    pub soffice_bin: PathBuf,
    /// Subprocess timeout in seconds.
    pub timeout: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            openssl_bin: PathBuf::from("openssl"),
            soffice_bin: PathBuf::from("soffice"),
            timeout: 120,
        }
    }
}

impl ToolSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Gemini file store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// Uploads are skipped entirely when unset.
    pub api_key: Option<String>,
    pub upload_url: String,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            upload_url: GEMINI_UPLOAD_URL.to_string(),
            timeout: 60,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory the browser saves attachments into; also served under /files.
    pub download_dir: PathBuf,
    /// Externally reachable base URL used to build file URLs.
    pub public_base_url: String,
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Default webhook destination when a request doesn't carry one.
    pub webhook_dest: Option<String>,
    /// Webhook request timeout in seconds.
    pub webhook_timeout: u64,
    /// Direct link download timeout in seconds.
    pub link_fetch_timeout: u64,
    /// Maximum number of queued background jobs.
    pub queue_capacity: usize,
    pub browser: BrowserSettings,
    pub portal: PortalSettings,
    pub timing: TimingSettings,
    pub tools: ToolSettings,
    pub gemini: GeminiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            public_base_url: "http://localhost:5000".to_string(),
            bind: DEFAULT_BIND.to_string(),
            webhook_dest: None,
            webhook_timeout: 30,
            link_fetch_timeout: 30,
            queue_capacity: 64,
            browser: BrowserSettings::default(),
            portal: PortalSettings::default(),
            timing: TimingSettings::default(),
            tools: ToolSettings::default(),
            gemini: GeminiSettings::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom download directory.
    pub fn with_download_dir(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            ..Default::default()
        }
    }

    /// Load settings: defaults, then the optional TOML file, then the process environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides. `lookup` returns the raw value of a variable.
    ///
    /// Empty values are ignored so that `FOO=` in a `.env` file doesn't blank a default.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(dir) = get("DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(url) = get("PUBLIC_BASE_URL") {
            self.public_base_url = url;
        }
        if let Some(bind) = get("BIND_ADDR") {
            self.bind = bind;
        } else if let Some(port) = get("PORT") {
            let host = self
                .bind
                .rsplit_once(':')
                .map(|(h, _)| h.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.bind = format!("{}:{}", host, port);
        }
        if let Some(dest) = get("WEBHOOK_DEST") {
            self.webhook_dest = Some(dest);
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(url) = get("GEMINI_UPLOAD_URL") {
            self.gemini.upload_url = url;
        }
        if let Some(url) = get("PORTAL_BASE_URL") {
            self.portal.base_url = url;
        }
        if let Some(list) = get("CATEGORY_WHITELIST") {
            self.portal.category_whitelist = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(bin) = get("CHROME_BIN") {
            self.browser.chrome_bin = Some(PathBuf::from(bin));
        }
        if let Some(driver) = get("CHROMEDRIVER_PATH") {
            self.browser.chromedriver_path = Some(PathBuf::from(driver));
        }
        if let Some(remote) = get("BROWSER_REMOTE_URL") {
            self.browser.remote_url = Some(remote);
        }
        if let Some(bin) = get("OPENSSL_BIN") {
            self.tools.openssl_bin = PathBuf::from(bin);
        }
        if let Some(bin) = get("SOFFICE_BIN") {
            self.tools.soffice_bin = PathBuf::from(bin);
        }
    }

    /// Reject settings that would make the pipeline misbehave at runtime.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.public_base_url = self.public_base_url.trim_end_matches('/').to_string();
        self.portal.base_url = self.portal.base_url.trim_end_matches('/').to_string();

        if let Some(bad) = self
            .portal
            .category_whitelist
            .iter()
            .find(|p| p.chars().count() != 2)
        {
            return Err(ConfigError::Invalid {
                key: "category_whitelist",
                message: format!("prefix {:?} must be exactly two characters", bad),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "queue_capacity",
                message: "must be at least 1".to_string(),
            });
        }
        if url::Url::parse(&self.public_base_url).is_err() {
            return Err(ConfigError::Invalid {
                key: "public_base_url",
                message: format!("{:?} is not a valid URL", self.public_base_url),
            });
        }
        Ok(())
    }

    /// Whether the Gemini upload stage is enabled.
    pub fn upload_enabled(&self) -> bool {
        self.gemini.api_key.is_some()
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout)
    }

    pub fn link_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.link_fetch_timeout)
    }
}
