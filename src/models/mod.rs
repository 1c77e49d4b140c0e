//! Data models for tenderscrape.

mod announcement;
mod attachment;
mod payload;

pub use announcement::{Announcement, AnnouncementSummary, FilterDecision};
pub use attachment::{AttachmentResult, PageVisitResult, RemoteFile, UploadStatus, VisitStatus};
pub use payload::{AnnouncementPayload, PAYLOAD_SOURCE};
