//! Announcement records and category filter decisions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A tender announcement as received from the inbound batch or built from a single URL.
///
/// Known fields are typed; anything else the caller sends is preserved in `extra`
/// but not relayed to the webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    /// Portal identifier (e.g. "2024/00123"). Required for batch records.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Issuing contracting entity.
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category_code: Option<String>,
    /// Attachment page. Derived from `id` when not supplied.
    #[serde(default)]
    pub documents_url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Announcement {
    /// Build an announcement for a bare documents URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            documents_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Derive the documents URL for a portal identifier.
    ///
    /// Slashes in the identifier become dashes: `2024/00123` maps to
    /// `{base}/tenders/2024-00123/view/detail/1`.
    pub fn documents_url_for(base_url: &str, id: &str) -> String {
        format!(
            "{}/tenders/{}/view/detail/1",
            base_url.trim_end_matches('/'),
            id.trim().replace('/', "-")
        )
    }

    /// Attach the derived documents URL unless one was supplied. Returns the URL in use.
    pub fn resolve_documents_url(&mut self, base_url: &str) -> Option<&str> {
        if self.documents_url.is_none() {
            if let Some(id) = self.id.as_deref().filter(|id| !id.trim().is_empty()) {
                self.documents_url = Some(Self::documents_url_for(base_url, id));
            }
        }
        self.documents_url.as_deref()
    }

    /// The subset of fields relayed to the webhook consumer.
    pub fn summary(&self) -> AnnouncementSummary {
        AnnouncementSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            entity: self.entity.clone(),
            status: self.status.clone(),
            category_code: self.category_code.clone(),
            documents_url: self.documents_url.clone(),
        }
    }

    /// Short label for log lines.
    pub fn log_label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.documents_url.as_deref())
            .unwrap_or("<unidentified>")
    }
}

/// Announcement fields included in the outbound payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementSummary {
    pub id: Option<String>,
    pub title: Option<String>,
    pub entity: Option<String>,
    pub status: Option<String>,
    pub category_code: Option<String>,
    pub documents_url: Option<String>,
}

/// Outcome of the category filter for one announcement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterDecision {
    pub announcement: Announcement,
    pub category_code: Option<String>,
    pub category_prefix: Option<String>,
    pub accepted: bool,
    /// Why the announcement was rejected without a code (page or element failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FilterDecision {
    /// Fail-closed rejection when no code could be read.
    pub fn rejected(announcement: Announcement, reason: impl Into<String>) -> Self {
        Self {
            announcement,
            category_code: None,
            category_prefix: None,
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}
