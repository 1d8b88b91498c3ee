//! URL comparison form and relative-link resolution.

use url::Url;

/// Query markers that make a query string significant for comparison.
const SIGNIFICANT_QUERY_MARKERS: &[&str] = &["format=", "download=", "file="];

/// Returns the comparison form of a URL.
///
/// Steps, in order:
/// 1. lowercase the whole URL
/// 2. strip a leading `http://` or `https://`
/// 3. strip a single trailing `/`
/// 4. drop the query string unless it contains `format=`, `download=` or `file=`
///
/// The result is only used as a grouping key; it is never requested.
#[must_use]
pub fn normalize_for_comparison(url: &str) -> String {
    let lowered = url.trim().to_lowercase();

    let without_scheme = lowered
        .strip_prefix("http://")
        .or_else(|| lowered.strip_prefix("https://"))
        .unwrap_or(&lowered);

    let without_slash = without_scheme
        .strip_suffix('/')
        .unwrap_or(without_scheme);

    match without_slash.split_once('?') {
        Some((base, query))
            if !SIGNIFICANT_QUERY_MARKERS
                .iter()
                .any(|marker| query.contains(marker)) =>
        {
            base.to_string()
        }
        _ => without_slash.to_string(),
    }
}

/// Resolves an `href` found on a page against the page's base URL.
///
/// Absolute `http(s)` links are returned unchanged. Root-relative links
/// (`/path`) are joined to the base origin; anything else is joined to the
/// base URL itself. Returns `None` when the base cannot be parsed or the
/// join fails.
#[must_use]
pub fn resolve(href: &str, base: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(href.to_string());
    }

    let base = Url::parse(base).ok()?;
    if href.starts_with('/') && !href.starts_with("//") {
        let origin = base.join("/").ok()?;
        return origin.join(href).ok().map(String::from);
    }
    base.join(href).ok().map(String::from)
}
