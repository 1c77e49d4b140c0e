//! One-shot JSON delivery of announcement payloads.
//!
//! Delivery is at most once: a failed POST is reported to the caller, which
//! logs it. There is no retry or persistence.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::models::AnnouncementPayload;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook answered HTTP {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .user_agent(concat!("tenderscrape/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// POST `payload` to `destination` once.
    pub async fn dispatch(
        &self,
        destination: &str,
        payload: &AnnouncementPayload,
    ) -> Result<(), WebhookError> {
        let response = self.client.post(destination).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status(status));
        }
        info!(
            "Webhook delivered for {} ({} results, has_attachments={})",
            payload.url,
            payload.results.len(),
            payload.has_attachments
        );
        Ok(())
    }
}
