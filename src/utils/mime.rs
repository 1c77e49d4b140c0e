//! MIME type guessing and extension checks.

use std::path::Path;

/// Fallback when the extension is unknown.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Guess a MIME type from a filename extension.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_MIME.to_string())
}

/// Case-insensitive check that `name` ends with `.{ext}` and has a non-empty stem.
pub fn has_extension(name: &str, ext: &str) -> bool {
    let ext = ext.trim_start_matches('.');
    match name.rsplit_once('.') {
        Some((stem, found)) => !stem.is_empty() && found.eq_ignore_ascii_case(ext),
        None => false,
    }
}
