//! Destination filenames derived from download URLs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use url::Url;

/// Replaces characters that are invalid in filenames with `_`.
///
/// Control characters become `_` too; everything else is kept.
#[must_use]
pub fn sanitize_filename(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Last non-empty path segment of `url`, percent-decoded.
fn last_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .rev()
        .find(|s| !s.is_empty())?
        .to_string();
    Some(
        urlencoding::decode(&segment)
            .map(std::borrow::Cow::into_owned)
            .unwrap_or(segment),
    )
}

/// True when the URL names a ZIP archive rather than a plain JSON file.
#[must_use]
pub fn is_zip_url(url: &str) -> bool {
    url.to_lowercase().contains(".zip")
}

/// Builds the local filename for a download URL.
///
/// Uses the sanitized last path segment. When that is empty or only an
/// extension, falls back to `file_<n>` where `n` is derived from the URL.
/// The name always ends in `.zip` for archive URLs and `.json` otherwise.
#[must_use]
pub fn destination_filename(url: &str) -> String {
    let extension = if is_zip_url(url) { ".zip" } else { ".json" };

    let mut name = last_segment(url)
        .map(|s| sanitize_filename(&s))
        .filter(|s| !s.is_empty() && s != ".zip" && s != ".json")
        .unwrap_or_else(|| format!("file_{}", url_bucket(url)));

    if !name.to_lowercase().ends_with(extension) {
        name.push_str(extension);
    }
    name
}

/// Four-digit bucket for fallback names.
fn url_bucket(url: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    hasher.finish() % 10_000
}
