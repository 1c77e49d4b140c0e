//! Shared utility functions.
//!
//! - `filenames`: attachment labels, download filenames and public file URLs
//! - `mime`: MIME type guessing and extension checks

mod filenames;
mod mime;

pub use filenames::{
    basename_from_reference, display_label, file_name_from_url, file_url, unique_destination,
};
pub use mime::{guess_mime, has_extension, DEFAULT_MIME};
