//! Link handling: normalization, deduplication, classification and caching.
//!
//! A link is a plain URL string naming one candidate JSON/ZIP resource.
//! Links are gathered by the crawler or entered by hand, stored in a
//! [`LinkCache`], and collapsed by [`dedupe`] when several spellings point at
//! the same resource.
//!
//! # Example
//!
//! ```
//! use anac_core::links::{LinkCache, dedupe};
//!
//! let mut cache = LinkCache::default();
//! cache.insert("http://x.com/a.json");
//! cache.insert("https://x.com/a.json/");
//! cache.insert("http://x.com/b.json");
//!
//! let (deduped, report) = dedupe(cache.links());
//! assert_eq!(report.links_removed, 1);
//! assert!(deduped.contains("https://x.com/a.json/"));
//! ```

mod cache;
mod dedup;
mod normalize;
mod patterns;

pub use cache::{CacheError, KnownList, LinkCache, read_link_lines};
pub use dedup::{DedupReport, DuplicateCluster, dedupe, find_duplicates};
pub use normalize::{normalize_for_comparison, resolve};
pub use patterns::{LinkPatternConfig, LinkPatterns, PatternError, is_download_link};
