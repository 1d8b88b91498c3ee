//! Static-HTML crawler for the open-data catalog.
//!
//! Crawling runs in two phases:
//!
//! 1. Catalog pages (`base_url`, then `base_url?page=N`) are scanned for
//!    links to dataset detail pages. Paging stops after `max_pages`, after
//!    two consecutive pages without datasets, or when a page has no link to
//!    the next one.
//! 2. Every dataset page (plus the known datasets) is scanned for JSON/ZIP
//!    download links.
//!
//! Known direct links are added to the result, and every link shaped like a
//! portal filesystem download is reported back so the caller can remember
//! it for the next crawl.

mod html;

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::AppConfig;
use crate::download::HttpClient;
use crate::links::{KnownList, LinkPatterns};

pub use html::{Anchor, anchors, dataset_links, download_links, has_next_page};

/// Dataset pages always visited, whether or not the catalog lists them.
pub const DEFAULT_KNOWN_DATASETS: &[&str] = &[
    "https://dati.anticorruzione.it/opendata/dataset/smartcig-tipo-fattispecie-contrattuale",
    "https://dati.anticorruzione.it/opendata/dataset/anac-dataset",
    "https://dati.anticorruzione.it/opendata/dataset/anac-datamart",
    "https://dati.anticorruzione.it/opendata/dataset/ocds-appalti-ordinari-2022",
    "https://dati.anticorruzione.it/opendata/dataset/ocds-appalti-ordinari-2021",
    "https://dati.anticorruzione.it/opendata/dataset/ocds-appalti-ordinari-2020",
    "https://dati.anticorruzione.it/opendata/dataset/ocds-appalti-ordinari-2019",
    "https://dati.anticorruzione.it/opendata/dataset/ocds-appalti-ordinari-2018",
    "https://dati.anticorruzione.it/opendata/dataset/ocds-appalti-ordinari-2017",
    "https://dati.anticorruzione.it/opendata/dataset/ocds-appalti-ordinari-2016",
    "https://dati.anticorruzione.it/opendata/dataset/dati-contratti-pubblici",
    "https://dati.anticorruzione.it/opendata/dataset/informazioni-sulle-procedure-di-gara-indette-a-partire-dal-1-gennaio-2019",
    "https://dati.anticorruzione.it/opendata/dataset/soggetti-attuatori-pnrr",
];

/// Archives always added to the crawl result.
pub const DEFAULT_KNOWN_DIRECT_LINKS: &[&str] = &[
    "https://dati.anticorruzione.it/opendata/download/dataset/smartcig-tipo-fattispecie-contrattuale/filesystem/smartcig-tipo-fattispecie-contrattuale_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/soggetti-attuatori-pnrr/filesystem/soggetti-attuatori-pnrr_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/dati-contratti-pubblici/filesystem/dati-contratti-pubblici_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/anac-dataset/filesystem/anac-dataset_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/anac-datamart/filesystem/anac-datamart_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/ocds-appalti-ordinari-2022/filesystem/ocds-appalti-ordinari-2022_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/ocds-appalti-ordinari-2021/filesystem/ocds-appalti-ordinari-2021_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/ocds-appalti-ordinari-2020/filesystem/ocds-appalti-ordinari-2020_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/ocds-appalti-ordinari-2019/filesystem/ocds-appalti-ordinari-2019_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/ocds-appalti-ordinari-2018/filesystem/ocds-appalti-ordinari-2018_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/ocds-appalti-ordinari-2017/filesystem/ocds-appalti-ordinari-2017_json.zip",
    "https://dati.anticorruzione.it/opendata/download/dataset/ocds-appalti-ordinari-2016/filesystem/ocds-appalti-ordinari-2016_json.zip",
];

/// Consecutive pages without datasets that end paging.
const MAX_EMPTY_PAGES: u32 = 2;

#[allow(clippy::expect_used)]
static DIRECT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https://dati\.anticorruzione\.it/opendata/download/dataset/.+?/filesystem/.+?\.(?:json|zip)",
    )
    .expect("direct link regex is valid") // Static pattern, safe to panic
});

/// True for portal filesystem downloads worth remembering.
#[must_use]
pub fn is_direct_link(url: &str) -> bool {
    DIRECT_LINK.is_match(url)
}

/// Errors that stop a crawl before it starts.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The catalog URL is not an absolute http(s) URL.
    #[error("invalid catalog URL: {url}")]
    InvalidBaseUrl {
        /// The configured URL.
        url: String,
    },
}

/// Crawl tunables.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// First catalog page.
    pub base_url: String,
    /// Catalog pages fetched at most.
    pub max_pages: u32,
    /// Attempts per page.
    pub page_attempts: u32,
    /// Delay before retry `n` is `n * retry_delay`.
    pub retry_delay: Duration,
    /// Formats a download button must name.
    pub include_formats: Vec<String>,
    /// Formats never collected.
    pub exclude_formats: Vec<String>,
}

impl CrawlSettings {
    /// Settings taken from the application config.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            max_pages: config.max_pages,
            page_attempts: 3,
            retry_delay: Duration::from_secs(2),
            include_formats: config.include_formats.clone(),
            exclude_formats: config.exclude_formats.clone(),
        }
    }
}

/// What a crawl found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Catalog pages fetched successfully.
    pub catalog_pages: u32,
    /// Dataset pages scanned, catalog finds first, then known datasets.
    pub dataset_pages: Vec<String>,
    /// Pages that failed every attempt.
    pub failed_pages: Vec<String>,
    /// Download links found, including known direct links.
    pub links: BTreeSet<String>,
    /// Links shaped like portal filesystem downloads.
    pub direct_links: Vec<String>,
}

/// Catalog crawler.
#[derive(Debug, Clone)]
pub struct Crawler {
    client: HttpClient,
    patterns: LinkPatterns,
    settings: CrawlSettings,
}

impl Crawler {
    /// Creates a crawler.
    #[must_use]
    pub fn new(client: HttpClient, patterns: LinkPatterns, settings: CrawlSettings) -> Self {
        Self {
            client,
            patterns,
            settings,
        }
    }

    /// Crawls the catalog, then every dataset page.
    ///
    /// `known_datasets` are visited even when the catalog does not list
    /// them; `known_direct_links` are added to the result unconditionally.
    /// Page failures are logged and recorded, never raised.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidBaseUrl`] when the catalog URL does not
    /// parse.
    #[instrument(skip_all, fields(base_url = %self.settings.base_url))]
    pub async fn crawl(
        &self,
        known_datasets: &[String],
        known_direct_links: &[String],
    ) -> Result<CrawlSummary, CrawlError> {
        let base = &self.settings.base_url;
        match Url::parse(base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(CrawlError::InvalidBaseUrl { url: base.clone() }),
        }

        let mut summary = CrawlSummary::default();
        let mut datasets = self.crawl_catalog(&mut summary).await;

        let mut seen: HashSet<String> = datasets.iter().cloned().collect();
        let before = datasets.len();
        for dataset in known_datasets {
            if seen.insert(dataset.clone()) {
                datasets.push(dataset.clone());
            }
        }
        info!(
            found = before,
            known_added = datasets.len() - before,
            "dataset pages collected"
        );

        for dataset in &datasets {
            let Some(page) = self.fetch_page(dataset, &mut summary).await else {
                continue;
            };
            let found = html::download_links(
                &page,
                base,
                &self.patterns,
                &self.settings.include_formats,
                &self.settings.exclude_formats,
            );
            debug!(dataset = %dataset, links = found.len(), "dataset page scanned");
            summary.links.extend(found);
        }
        summary.dataset_pages = datasets;

        summary
            .links
            .extend(known_direct_links.iter().cloned());
        summary.direct_links = summary
            .links
            .iter()
            .filter(|link| is_direct_link(link))
            .cloned()
            .collect();

        info!(
            catalog_pages = summary.catalog_pages,
            dataset_pages = summary.dataset_pages.len(),
            links = summary.links.len(),
            failed = summary.failed_pages.len(),
            "crawl finished"
        );
        Ok(summary)
    }

    /// Phase 1: dataset pages listed by the paginated catalog.
    async fn crawl_catalog(&self, summary: &mut CrawlSummary) -> Vec<String> {
        let mut datasets: Vec<String> = Vec::new();
        let mut empty_pages = 0;
        let mut page_num = 1;

        while empty_pages < MAX_EMPTY_PAGES && page_num <= self.settings.max_pages {
            let url = page_url(&self.settings.base_url, page_num);
            match self.fetch_page(&url, summary).await {
                Some(page) => {
                    summary.catalog_pages += 1;
                    let found = html::dataset_links(&page, &self.settings.base_url);
                    if found.is_empty() {
                        empty_pages += 1;
                        warn!(page = page_num, empty_pages, "no datasets on catalog page");
                    } else {
                        empty_pages = 0;
                        debug!(page = page_num, datasets = found.len(), "catalog page scanned");
                        for dataset in found {
                            if !datasets.contains(&dataset) {
                                datasets.push(dataset);
                            }
                        }
                    }
                    if !html::has_next_page(&page, page_num) {
                        debug!(page = page_num, "no next page");
                        break;
                    }
                }
                None => empty_pages += 1,
            }
            page_num += 1;
        }
        datasets
    }

    /// Fetches a page with linear backoff; `None` once attempts run out.
    async fn fetch_page(&self, url: &str, summary: &mut CrawlSummary) -> Option<String> {
        let attempts = self.settings.page_attempts.max(1);
        for attempt in 1..=attempts {
            match self.client.get_text(url).await {
                Ok(page) => return Some(page),
                Err(error) => {
                    warn!(url, attempt, attempts, error = %error, "page fetch failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.retry_delay * attempt).await;
                    }
                }
            }
        }
        summary.failed_pages.push(url.to_string());
        None
    }
}

/// URL of catalog page `page_num` (page 1 is the base URL itself).
#[must_use]
pub fn page_url(base_url: &str, page_num: u32) -> String {
    if page_num <= 1 {
        return base_url.to_string();
    }
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}page={page_num}")
}

/// Adds what a crawl learned to the known-source lists.
///
/// Returns how many datasets and direct links were new.
pub fn record_known_sources(
    summary: &CrawlSummary,
    datasets: &mut KnownList,
    direct_links: &mut KnownList,
) -> (usize, usize) {
    let added_datasets = summary
        .dataset_pages
        .iter()
        .filter(|page| datasets.add(page.as_str()))
        .count();
    let added_direct = summary
        .direct_links
        .iter()
        .filter(|link| direct_links.add(link.as_str()))
        .count();
    (added_datasets, added_direct)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url() {
        assert_eq!(page_url("https://x.it/dataset", 1), "https://x.it/dataset");
        assert_eq!(page_url("https://x.it/dataset", 3), "https://x.it/dataset?page=3");
        assert_eq!(
            page_url("https://x.it/dataset?q=a", 2),
            "https://x.it/dataset?q=a&page=2"
        );
    }

    #[test]
    fn test_is_direct_link() {
        assert!(is_direct_link(DEFAULT_KNOWN_DIRECT_LINKS[0]));
        assert!(!is_direct_link(
            "https://dati.anticorruzione.it/opendata/dataset/anac-dataset"
        ));
        assert!(!is_direct_link("https://example.com/filesystem/a.zip"));
    }

    #[test]
    fn test_record_known_sources_counts_new_entries() {
        let summary = CrawlSummary {
            dataset_pages: vec!["https://x.it/dataset/a".into(), "https://x.it/dataset/b".into()],
            direct_links: vec![DEFAULT_KNOWN_DIRECT_LINKS[0].to_string()],
            ..CrawlSummary::default()
        };
        let mut datasets = KnownList::from_items(["https://x.it/dataset/a"]);
        let mut direct = KnownList::default();

        assert_eq!(record_known_sources(&summary, &mut datasets, &mut direct), (1, 1));
        assert_eq!(datasets.len(), 2);
        assert_eq!(record_known_sources(&summary, &mut datasets, &mut direct), (0, 0));
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_error() {
        let settings = CrawlSettings {
            base_url: "not a url".into(),
            ..CrawlSettings::from_config(&AppConfig::default())
        };
        let crawler = Crawler::new(HttpClient::new().unwrap(), LinkPatterns::default(), settings);
        assert!(matches!(
            crawler.crawl(&[], &[]).await,
            Err(CrawlError::InvalidBaseUrl { .. })
        ));
    }
}
