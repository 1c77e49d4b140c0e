//! Per-attachment results and page visit outcomes.

use serde::{Deserialize, Serialize};

/// Handle returned by the remote file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub uri: String,
    pub name: String,
    pub mime_type: String,
    pub state: String,
}

/// Whether the remote upload for an attachment succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded,
    Failed,
}

/// Result for one attachment on a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentResult {
    /// 1-based position in the page's attachment list; 0 for page-level errors.
    pub index: usize,
    /// Display text with the trailing extension stripped.
    pub label: String,
    /// Link target of the element. Informational; retrieval happens by clicking.
    pub href: String,
    /// Final on-disk filename in the download directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_file: Option<String>,
    /// Public URL of `saved_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_file: Option<RemoteFile>,
    /// Absent when no upload was attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_upload: Option<UploadStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttachmentResult {
    pub fn new(index: usize, label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            href: href.into(),
            ..Default::default()
        }
    }

    /// Single entry describing a failure of the whole page visit.
    pub fn page_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Record an error without overwriting an earlier one.
    pub fn note_error(&mut self, error: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(error.into());
        }
    }
}

/// How a page visit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    /// Attachment items were found and processed (individual items may have failed).
    Ok,
    /// The page loaded but had no attachment items. Not an error.
    NoAttachments,
    /// The page itself could not be loaded.
    PageError,
}

/// Ordered attachment results of one page visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVisitResult {
    pub url: String,
    pub status: VisitStatus,
    pub attachments: Vec<AttachmentResult>,
}

impl PageVisitResult {
    pub fn completed(url: impl Into<String>, attachments: Vec<AttachmentResult>) -> Self {
        Self {
            url: url.into(),
            status: VisitStatus::Ok,
            attachments,
        }
    }

    pub fn no_attachments(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: VisitStatus::NoAttachments,
            attachments: Vec::new(),
        }
    }

    pub fn page_error(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: VisitStatus::PageError,
            attachments: vec![AttachmentResult::page_error(error)],
        }
    }

    /// Number of attachments that produced a file on disk.
    pub fn saved_count(&self) -> usize {
        self.attachments
            .iter()
            .filter(|a| a.saved_file.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_omitted_from_json() {
        let result = AttachmentResult::new(1, "doc", "https://portal.test/doc.pdf");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["index"], 1);
        assert!(json.get("saved_file").is_none());
        assert!(json.get("gemini_upload").is_none());
    }

    #[test]
    fn test_note_error_keeps_first() {
        let mut result = AttachmentResult::new(2, "a", "");
        result.note_error("click failed");
        result.note_error("upload failed");
        assert_eq!(result.error.as_deref(), Some("click failed"));
    }

    #[test]
    fn test_page_error_has_single_entry() {
        let visit = PageVisitResult::page_error("https://portal.test/x", "navigation timed out");
        assert_eq!(visit.status, VisitStatus::PageError);
        assert_eq!(visit.attachments.len(), 1);
        assert_eq!(visit.attachments[0].index, 0);
        assert_eq!(visit.saved_count(), 0);
    }

    #[test]
    fn test_upload_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(UploadStatus::Failed).unwrap(),
            serde_json::json!("failed")
        );
    }
}
