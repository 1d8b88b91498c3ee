//! Classification of candidate URLs as JSON/ZIP downloads.
//!
//! The patterns are data, not code: [`LinkPatterns`] is deserialized from the
//! `link_patterns` config section, falling back to the defaults below.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Substrings that mark a URL as JSON-bearing.
const DEFAULT_JSON_MARKERS: &[&str] = &[
    "format=json",
    "/json/",
    "_json_",
    "json_download",
    "download_json",
    "json-data",
    "data.json",
];

/// Regex patterns that mark a URL as JSON-bearing.
const DEFAULT_JSON_PATTERNS: &[&str] = &[
    r"/filesystem/[^/]*_json",
    r"/resource/[^/]*_json",
    r"/download/[^/]*json",
];

/// Regex patterns for ZIP archives that likely contain JSON.
const DEFAULT_ZIP_PATTERNS: &[&str] = &[
    r"/filesystem/[^/]*_json\.zip",
    r"/resource/[^/]*_json\.zip",
    r"json[^/]*\.zip",
];

/// Portal paths known to serve JSON datasets.
const DEFAULT_PORTAL_PATHS: &[&str] = &[
    "/opendata/download/dataset/",
    "/download/dataset/",
    "/anac-dataset/",
    "/anac-datamart/",
    "/dati-contratti-pubblici/",
    "/ocds-appalti-ordinari-",
    "/smartcig-tipo-fattispecie-contrattuale/",
];

/// Error compiling a configured pattern.
#[derive(Debug, Error)]
#[error("invalid link pattern `{pattern}`: {source}")]
pub struct PatternError {
    /// The offending pattern source.
    pub pattern: String,
    /// Regex compile error.
    #[source]
    pub source: regex::Error,
}

/// Serializable pattern lists, as they appear in `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkPatternConfig {
    /// Plain substrings marking JSON links.
    pub json_markers: Vec<String>,
    /// Regexes marking JSON links.
    pub json_patterns: Vec<String>,
    /// Regexes marking JSON-bearing ZIP archives.
    pub zip_patterns: Vec<String>,
    /// Plain substrings of portal paths that serve datasets.
    pub portal_paths: Vec<String>,
}

impl Default for LinkPatternConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            json_markers: owned(DEFAULT_JSON_MARKERS),
            json_patterns: owned(DEFAULT_JSON_PATTERNS),
            zip_patterns: owned(DEFAULT_ZIP_PATTERNS),
            portal_paths: owned(DEFAULT_PORTAL_PATHS),
        }
    }
}

/// Compiled link classifier.
#[derive(Debug, Clone)]
pub struct LinkPatterns {
    json_markers: Vec<String>,
    json_patterns: Vec<Regex>,
    zip_patterns: Vec<Regex>,
    portal_paths: Vec<String>,
}

impl Default for LinkPatterns {
    fn default() -> Self {
        // The built-in regexes are known to compile.
        let compile = |items: &[&str]| {
            items
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect::<Vec<_>>()
        };
        let lower = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            json_markers: lower(DEFAULT_JSON_MARKERS),
            json_patterns: compile(DEFAULT_JSON_PATTERNS),
            zip_patterns: compile(DEFAULT_ZIP_PATTERNS),
            portal_paths: lower(DEFAULT_PORTAL_PATHS),
        }
    }
}

impl LinkPatterns {
    /// Compiles a pattern configuration.
    ///
    /// Regexes are matched against the lowercased URL, so they should be
    /// written in lowercase.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] for the first regex that fails to compile.
    pub fn from_config(config: &LinkPatternConfig) -> Result<Self, PatternError> {
        Ok(Self {
            json_markers: lowercase_all(&config.json_markers),
            json_patterns: compile_all(&config.json_patterns)?,
            zip_patterns: compile_all(&config.zip_patterns)?,
            portal_paths: lowercase_all(&config.portal_paths),
        })
    }

    /// Returns true when `url` looks like a JSON file or a ZIP holding JSON.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let url = url.trim().to_lowercase();
        if url.is_empty() {
            return false;
        }

        if has_marker(&url, "json") {
            return true;
        }

        if has_marker(&url, "zip") {
            if self.zip_patterns.iter().any(|re| re.is_match(&url))
                || self.portal_paths.iter().any(|p| url.contains(p.as_str()))
            {
                return true;
            }
            let file_name = url.rsplit('/').next().unwrap_or(&url);
            if file_name.contains("json") {
                return true;
            }
        }

        self.json_markers.iter().any(|m| url.contains(m.as_str()))
            || self.json_patterns.iter().any(|re| re.is_match(&url))
            || self.portal_paths.iter().any(|p| url.contains(p.as_str()))
    }
}

/// Returns true when `url` is a download candidate according to `patterns`.
#[must_use]
pub fn is_download_link(url: &str, patterns: &LinkPatterns) -> bool {
    patterns.matches(url)
}

/// Explicit extension marker: `.ext` at the end, `_ext.` anywhere or `.ext?`.
fn has_marker(url: &str, ext: &str) -> bool {
    url.ends_with(&format!(".{ext}"))
        || url.contains(&format!("_{ext}."))
        || url.contains(&format!(".{ext}?"))
}

fn compile_all(sources: &[String]) -> Result<Vec<Regex>, PatternError> {
    sources
        .iter()
        .map(|source| {
            Regex::new(source).map_err(|e| PatternError {
                pattern: source.clone(),
                source: e,
            })
        })
        .collect()
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}
