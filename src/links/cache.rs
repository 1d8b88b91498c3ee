//! Line-oriented link files: the link cache and the known-source lists.
//!
//! All files share one format: UTF-8 text, one URL per line, no header.
//! Blank lines are skipped on load and never written.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::fs_util;

/// Errors reading or writing link files.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The file could not be read or written.
    #[error("IO error on link file {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reads non-blank, trimmed lines from a UTF-8 link file.
///
/// A missing file yields an empty list.
fn read_lines(path: &Path) -> Result<Vec<String>, CacheError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

fn write_lines<'a>(
    path: &Path,
    lines: impl IntoIterator<Item = &'a String>,
) -> Result<(), CacheError> {
    let mut body = String::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }
    fs_util::write_atomic(path, body.as_bytes()).map_err(|e| CacheError::io(path, e))
}

/// Reads links from a user-supplied file.
///
/// Unlike the cache loaders, a missing file is an error. Files that are not
/// valid UTF-8 are decoded as Latin-1.
///
/// # Errors
///
/// Returns [`CacheError::Io`] if the file cannot be read.
pub fn read_link_lines(path: &Path) -> Result<Vec<String>, CacheError> {
    let bytes = std::fs::read(path).map_err(|e| CacheError::io(path, e))?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| char::from(b)).collect(),
    };
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// The set of discovered download links.
///
/// Links are unique by raw string. The set is ordered, so iteration and the
/// saved file are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkCache {
    links: BTreeSet<String>,
}

impl LinkCache {
    /// Loads the cache from `path`; a missing file gives an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file exists but cannot be read.
    #[instrument(level = "debug", fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let links: BTreeSet<String> = read_lines(path)?.into_iter().collect();
        debug!(count = links.len(), "loaded link cache");
        Ok(Self { links })
    }

    /// Writes the cache to `path`, one link per line.
    ///
    /// The parent directory is created if needed and the file is replaced
    /// atomically.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file cannot be written.
    #[instrument(level = "debug", skip(self), fields(path = %path.display(), count = self.links.len()))]
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        write_lines(path, &self.links)
    }

    /// Adds a link; returns false if it was blank or already present.
    pub fn insert(&mut self, link: impl Into<String>) -> bool {
        let link = link.into().trim().to_string();
        !link.is_empty() && self.links.insert(link)
    }

    /// Adds every link, returning how many were new.
    pub fn extend<I, S>(&mut self, links: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for link in links {
            if self.insert(link) {
                added += 1;
            }
        }
        added
    }

    /// Replaces the whole set, e.g. with a deduplicated one.
    pub fn replace(&mut self, links: BTreeSet<String>) {
        self.links = links;
    }

    /// Returns the links in order.
    #[must_use]
    pub fn links(&self) -> &BTreeSet<String> {
        &self.links
    }

    /// Returns true if the link is cached.
    #[must_use]
    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    /// Number of cached links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True when no links are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// An ordered list of unique URLs (known datasets, known direct links).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownList {
    items: Vec<String>,
}

impl KnownList {
    /// Builds a list from `items`, dropping blanks and repeats.
    #[must_use]
    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        for item in items {
            list.add(item);
        }
        list
    }

    /// Loads the list from `path`; a missing file gives an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        Ok(Self::from_items(read_lines(path)?))
    }

    /// Loads the list from `path`, seeding it with `defaults` when the file
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file exists but cannot be read.
    pub fn load_or(path: &Path, defaults: &[&str]) -> Result<Self, CacheError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::from_items(defaults.iter().copied()))
        }
    }

    /// Writes the list to `path` in order.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        write_lines(path, &self.items)
    }

    /// Appends a URL; returns false if blank or already listed.
    pub fn add(&mut self, item: impl Into<String>) -> bool {
        let item = item.into().trim().to_string();
        if item.is_empty() || self.items.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Removes the entry at a zero-based position.
    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Entries in order.
    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ==================== LinkCache Tests ====================

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = LinkCache::load(&dir.path().join("json_links.txt")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_skips_blank_lines_and_collapses_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("json_links.txt");
        std::fs::write(
            &path,
            "https://x.com/a.json\n\n   \nhttps://x.com/b.zip\r\n  https://x.com/a.json  \n",
        )
        .unwrap();

        let cache = LinkCache::load(&path).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("https://x.com/a.json"));
        assert!(cache.contains("https://x.com/b.zip"));
    }

    #[test]
    fn test_save_then_load_preserves_set_and_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("json_links.txt");
        let mut cache = LinkCache::default();
        assert!(cache.insert("https://x.com/b.json"));
        assert!(cache.insert("https://x.com/a.json"));
        assert!(!cache.insert("https://x.com/a.json"));
        assert!(!cache.insert("   "));

        cache.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "https://x.com/a.json\nhttps://x.com/b.json\n");
        assert_eq!(LinkCache::load(&path).unwrap(), cache);
    }

    #[test]
    fn test_extend_counts_new_links() {
        let mut cache = LinkCache::default();
        cache.insert("https://x.com/a.json");
        let added = cache.extend(["https://x.com/a.json", "https://x.com/c.json", ""]);
        assert_eq!(added, 1);
        assert_eq!(cache.len(), 2);
    }

    // ==================== KnownList Tests ====================

    #[test]
    fn test_known_list_keeps_order_and_uniqueness() {
        let mut list = KnownList::from_items(["b", "a", "b"]);
        assert_eq!(list.items(), ["b".to_string(), "a".to_string()]);
        assert!(list.add("c"));
        assert!(!list.add("a"));
        assert_eq!(list.remove(0).as_deref(), Some("b"));
        assert_eq!(list.remove(5), None);
        assert_eq!(list.items(), ["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_known_list_load_or_seeds_defaults_only_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("known_datasets.txt");

        let seeded = KnownList::load_or(&path, &["https://x.com/d1"]).unwrap();
        assert_eq!(seeded.len(), 1);

        std::fs::write(&path, "").unwrap();
        let loaded = KnownList::load_or(&path, &["https://x.com/d1"]).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_known_list_save_round_trip_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("known_direct_links.txt");
        let list = KnownList::from_items(["https://x.com/z.zip", "https://x.com/a.zip"]);
        list.save(&path).unwrap();
        assert_eq!(KnownList::load(&path).unwrap(), list);
    }

    // ==================== read_link_lines Tests ====================

    #[test]
    fn test_read_link_lines_falls_back_to_latin1() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("links.txt");
        std::fs::write(&path, b"https://x.com/caf\xe9.json\n\nhttps://x.com/b.json\n").unwrap();

        let lines = read_link_lines(&path).unwrap();
        assert_eq!(lines, vec!["https://x.com/café.json", "https://x.com/b.json"]);
    }

    #[test]
    fn test_read_link_lines_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        assert!(read_link_lines(&dir.path().join("absent.txt")).is_err());
    }
}
