//! Anchor extraction from static catalog and dataset pages.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::archive::matches_extension;
use crate::links::{self, LinkPatterns};

#[allow(clippy::expect_used)]
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href]").expect("anchor selector is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static NEXT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)succes|next|avanti|prossim").expect("next-text regex is valid") // Static pattern, safe to panic
});

/// Link texts that mark a download button on dataset pages.
const DOWNLOAD_TEXTS: &[&str] = &["vai alla risorsa", "download", "scarica", "json", "zip"];

/// One `<a href>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Raw `href`, entity-decoded.
    pub href: String,
    /// Visible text, tags stripped, lowercased.
    pub text: String,
    /// Carries `rel="next"`.
    pub rel_next: bool,
}

/// All anchors with an `href`, in document order.
#[must_use]
pub fn anchors(html: &str) -> Vec<Anchor> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|element| {
            let attrs = element.value();
            let href = attrs.attr("href")?.trim().to_string();
            let text = element.text().collect::<Vec<_>>().join(" ");
            Some(Anchor {
                href,
                text: text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase(),
                rel_next: attrs
                    .attr("rel")
                    .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("next"))),
            })
        })
        .collect()
}

/// Dataset detail pages linked from a catalog page, absolute, unique, in
/// order.
#[must_use]
pub fn dataset_links(html: &str, base_url: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for anchor in anchors(html) {
        let lower = anchor.href.to_lowercase();
        if !lower.contains("/dataset/")
            || [".json", ".csv", ".xml"].iter().any(|ext| lower.ends_with(ext))
        {
            continue;
        }
        if let Some(url) = links::resolve(&anchor.href, base_url)
            && !found.contains(&url)
        {
            found.push(url);
        }
    }
    found
}

/// Download links on a dataset page, absolute, unique, in order.
///
/// An href is dropped when it carries an excluded format (`.ext` or
/// `_ext.`). Otherwise it is kept when the link classifier accepts it, or
/// when its text reads like a download button and the href names an
/// included format or a portal resource.
#[must_use]
pub fn download_links(
    html: &str,
    base_url: &str,
    patterns: &LinkPatterns,
    include_formats: &[String],
    exclude_formats: &[String],
) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for anchor in anchors(html) {
        let lower = anchor.href.to_lowercase();
        if exclude_formats
            .iter()
            .any(|ext| lower.contains(&format!(".{ext}")) || matches_extension(&lower, ext))
        {
            continue;
        }

        let by_pattern = links::is_download_link(&anchor.href, patterns);
        let by_text = DOWNLOAD_TEXTS.iter().any(|t| anchor.text.contains(t))
            && (include_formats.iter().any(|f| lower.contains(&f.to_lowercase()))
                || lower.contains("resource"));
        if !by_pattern && !by_text {
            continue;
        }

        if let Some(url) = links::resolve(&anchor.href, base_url)
            && !found.contains(&url)
        {
            found.push(url);
        }
    }
    found
}

/// True when the page links to the page after `current_page`.
#[must_use]
pub fn has_next_page(html: &str, current_page: u32) -> bool {
    let next = format!("page={}", current_page + 1);
    anchors(html).iter().any(|anchor| {
        anchor.rel_next
            || NEXT_TEXT.is_match(&anchor.text)
            || anchor
                .href
                .match_indices(&next)
                .any(|(idx, _)| is_page_param(&anchor.href, idx, next.len()))
    })
}

/// `page=N` at `idx` is a whole query parameter (`[?&]page=N(&|$)`).
fn is_page_param(href: &str, idx: usize, len: usize) -> bool {
    let before = href[..idx].chars().next_back();
    let after = href[idx + len..].chars().next();
    matches!(before, Some('?' | '&')) && matches!(after, None | Some('&' | '#'))
}
