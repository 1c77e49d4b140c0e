//! Attachment labels, download filenames and public file URLs.

use std::path::{Path, PathBuf};

/// Fallback filename for links whose path has no usable last segment.
const FALLBACK_FILENAME: &str = "file.pdf";

/// Turn an attachment's visible text into a display label.
///
/// Trims whitespace and drops a trailing `.ext` (1-5 alphanumerics) so that
/// "Capitolato.pdf" reads "Capitolato". Text that is only an extension is kept.
pub fn display_label(text: &str) -> String {
    let text = text.trim();
    if let Some((stem, ext)) = text.rsplit_once('.') {
        let is_extension =
            (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric());
        let stem = stem.trim_end();
        if is_extension && !stem.is_empty() {
            return stem.to_string();
        }
    }
    text.to_string()
}

/// Pick a path in `dir` for `name` that doesn't collide with an existing file.
///
/// Collisions get a browser-style counter: `doc.pdf`, `doc (1).pdf`, `doc (2).pdf`.
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Filename for a direct link: the percent-decoded last path segment.
pub fn file_name_from_url(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    sanitize_basename(&decoded).unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Resolve a previously issued file URL, or a bare filename, to a basename.
///
/// Returns `None` for anything that would escape the download directory.
pub fn basename_from_reference(reference: &str) -> Option<String> {
    let reference = reference.trim();
    let raw = match url::Url::parse(reference) {
        Ok(parsed) if parsed.has_host() => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        _ => reference.to_string(),
    };
    let decoded = urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .unwrap_or(raw);
    sanitize_basename(&decoded)
}

/// Public URL under which a downloaded file is served.
pub fn file_url(public_base_url: &str, filename: &str) -> String {
    format!(
        "{}/files/{}",
        public_base_url.trim_end_matches('/'),
        urlencoding::encode(filename)
    )
}

fn sanitize_basename(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return None;
    }
    Some(name.to_string())
}
