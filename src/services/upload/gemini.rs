//! Gemini Files API upload.
//!
//! Files are sent as one multipart request: a `metadata` JSON part carrying
//! the display name, then the `file` part. The API answers with the stored
//! file's handle:
//!
//! ```json
//! {"file": {"name": "files/abc", "uri": "https://...", "mimeType": "application/pdf", "state": "ACTIVE"}}
//! ```

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{RemoteFileStore, UploadError};
use crate::config::GeminiSettings;
use crate::models::RemoteFile;
use crate::utils::guess_mime;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: Option<GeminiFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    #[serde(default)]
    name: String,
    uri: Option<String>,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: String,
}

/// Uploads attachments to the Gemini Files API.
pub struct GeminiFileStore {
    client: Client,
    api_key: String,
    upload_url: String,
}

impl GeminiFileStore {
    pub fn new(
        api_key: impl Into<String>,
        upload_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            upload_url: upload_url.into(),
        })
    }

    /// Build a store when an API key is configured.
    pub fn from_settings(settings: &GeminiSettings) -> Result<Option<Self>, UploadError> {
        match settings.api_key.as_deref() {
            Some(key) => Ok(Some(Self::new(
                key,
                settings.upload_url.clone(),
                Duration::from_secs(settings.timeout),
            )?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RemoteFileStore for GeminiFileStore {
    async fn upload(
        &self,
        path: &Path,
        display_name: &str,
        mime_type: Option<&str>,
    ) -> Result<RemoteFile, UploadError> {
        let mime_type = mime_type
            .map(str::to_string)
            .unwrap_or_else(|| guess_mime(path));
        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let size = bytes.len();

        let metadata = serde_json::json!({ "file": { "display_name": display_name } });
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display_name.to_string());

        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string()).mime_str("application/json")?,
            )
            .part(
                "file",
                Part::bytes(bytes).file_name(file_name).mime_str(&mime_type)?,
            );

        let response = self
            .client
            .post(&self.upload_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "multipart")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status { status, body });
        }

        let parsed: UploadResponse = response.json().await?;
        let file = parsed
            .file
            .ok_or_else(|| UploadError::Response("missing `file` object".to_string()))?;
        let uri = file
            .uri
            .ok_or_else(|| UploadError::Response("missing `file.uri`".to_string()))?;

        debug!("Uploaded {} ({} bytes) as {}", path.display(), size, file.name);
        Ok(RemoteFile {
            uri,
            name: file.name,
            mime_type: if file.mime_type.is_empty() {
                mime_type
            } else {
                file.mime_type
            },
            state: file.state,
        })
    }
}
