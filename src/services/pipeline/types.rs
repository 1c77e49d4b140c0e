//! Pipeline requests and per-announcement outcomes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Announcement;
use crate::services::download::FetchError;
use crate::services::upload::UploadError;
use crate::services::webhook::WebhookError;

/// Errors building a pipeline. Running one never fails as a whole.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("webhook client: {0}")]
    Webhook(#[from] WebhookError),
    #[error("link fetcher: {0}")]
    Fetch(#[from] FetchError),
    #[error("upload store: {0}")]
    Upload(#[from] UploadError),
}

/// One unit of work accepted by the server or the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScrapeRequest {
    /// Bare documents URLs. No category filtering.
    Urls {
        urls: Vec<String>,
        webhook_url: Option<String>,
    },
    /// Announcement records, filtered by category before scraping.
    Batch {
        announcements: Vec<Announcement>,
        webhook_url: Option<String>,
    },
    /// One announcement whose attachment links are already known.
    DirectLinks {
        announcement: Announcement,
        links: Vec<String>,
        webhook_url: Option<String>,
    },
}

impl ScrapeRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Urls { .. } => "urls",
            Self::Batch { .. } => "batch",
            Self::DirectLinks { .. } => "direct_links",
        }
    }

    pub fn webhook_url(&self) -> Option<&str> {
        match self {
            Self::Urls { webhook_url, .. }
            | Self::Batch { webhook_url, .. }
            | Self::DirectLinks { webhook_url, .. } => webhook_url.as_deref(),
        }
    }

    /// Number of announcements (or URLs) the request will produce outcomes for.
    pub fn len(&self) -> usize {
        match self {
            Self::Urls { urls, .. } => urls.len(),
            Self::Batch { announcements, .. } => announcements.len(),
            Self::DirectLinks { .. } => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// What the request will visit, for acknowledgements and job records.
    pub fn targets(&self) -> Vec<String> {
        match self {
            Self::Urls { urls, .. } => urls.clone(),
            Self::Batch { announcements, .. } => announcements
                .iter()
                .map(|a| a.log_label().to_string())
                .collect(),
            Self::DirectLinks { links, .. } => links.clone(),
        }
    }
}

/// Where an announcement's processing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStage {
    /// Category filter rejected it; nothing was scraped or sent.
    Rejected,
    Dispatched,
    DispatchFailed,
    /// No webhook destination was configured.
    NotDispatched,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementOutcome {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announcement_id: Option<String>,
    pub stage: OutcomeStage,
    /// Attachments that ended up on disk.
    pub saved: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnnouncementOutcome {
    pub fn rejected(announcement: &Announcement, reason: Option<String>) -> Self {
        Self {
            url: announcement.documents_url.clone().unwrap_or_default(),
            announcement_id: announcement.id.clone(),
            stage: OutcomeStage::Rejected,
            saved: 0,
            error: reason,
        }
    }
}
