//! Browser-driven scraping of the procurement portal.

pub mod attachments;
pub mod browser;
pub mod category;

pub use attachments::{AttachmentError, AttachmentLocator};
pub use browser::{BrowserError, BrowserSession, ChromeLauncher, LinkInfo, SessionProvider};
pub use category::{category_prefix, parse_category_code, CategoryFilter, FilterOutcome};
