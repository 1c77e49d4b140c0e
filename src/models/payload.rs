//! Outbound webhook payload.

use serde::{Deserialize, Serialize};

use super::{Announcement, AnnouncementSummary, AttachmentResult};

/// Identifies this service in outbound payloads.
pub const PAYLOAD_SOURCE: &str = "tenderscrape";

/// Body POSTed to the webhook destination, one per announcement or URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementPayload {
    pub url: String,
    pub announcement: AnnouncementSummary,
    pub results: Vec<AttachmentResult>,
    /// True when at least one attachment was saved.
    pub has_attachments: bool,
    pub source: String,
}

impl AnnouncementPayload {
    pub fn new(url: impl Into<String>, announcement: &Announcement, results: Vec<AttachmentResult>) -> Self {
        let has_attachments = results.iter().any(|r| r.saved_file.is_some());
        Self {
            url: url.into(),
            announcement: announcement.summary(),
            results,
            has_attachments,
            source: PAYLOAD_SOURCE.to_string(),
        }
    }
}
