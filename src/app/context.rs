//! Shared runtime context built after CLI parsing and config loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use anac_core::crawl::{DEFAULT_KNOWN_DATASETS, DEFAULT_KNOWN_DIRECT_LINKS};
use anac_core::{
    AppConfig, CrawlSettings, Crawler, Downloader, HttpClient, KnownList, LinkCache, Pipeline,
};

use crate::cli::KnownKind;

/// Holds the loaded configuration so handlers can build library objects
/// without re-reading it.
pub(crate) struct AppContext {
    pub(crate) config: AppConfig,
    pub(crate) config_path: PathBuf,
    pub(crate) show_progress: bool,
}

impl AppContext {
    /// Loads `config_path`, creating it with defaults when missing.
    pub(crate) fn load(config_path: &Path, show_progress: bool) -> Result<Self> {
        let config = AppConfig::load_or_create(config_path)
            .with_context(|| format!("cannot use config file {}", config_path.display()))?;
        Ok(Self {
            config,
            config_path: config_path.to_path_buf(),
            show_progress,
        })
    }

    pub(crate) fn load_link_cache(&self) -> Result<LinkCache> {
        let path = self.config.link_cache_path();
        LinkCache::load(&path).with_context(|| format!("cannot read link cache {}", path.display()))
    }

    pub(crate) fn save_link_cache(&self, cache: &LinkCache) -> Result<()> {
        let path = self.config.link_cache_path();
        cache
            .save(&path)
            .with_context(|| format!("cannot write link cache {}", path.display()))
    }

    fn known_path(&self, kind: KnownKind) -> PathBuf {
        match kind {
            KnownKind::Datasets => self.config.known_datasets_path(),
            KnownKind::Direct => self.config.known_direct_links_path(),
        }
    }

    /// Loads a known-source list, seeded with the built-in entries when its
    /// file does not exist yet.
    pub(crate) fn load_known(&self, kind: KnownKind) -> Result<KnownList> {
        let path = self.known_path(kind);
        let defaults = match kind {
            KnownKind::Datasets => DEFAULT_KNOWN_DATASETS,
            KnownKind::Direct => DEFAULT_KNOWN_DIRECT_LINKS,
        };
        KnownList::load_or(&path, defaults)
            .with_context(|| format!("cannot read known list {}", path.display()))
    }

    pub(crate) fn save_known(&self, kind: KnownKind, list: &KnownList) -> Result<()> {
        let path = self.known_path(kind);
        list.save(&path)
            .with_context(|| format!("cannot write known list {}", path.display()))
    }

    pub(crate) fn http_client(&self) -> Result<HttpClient> {
        let options = self.config.download_options(false);
        HttpClient::with_settings(options.timeout, &options.user_agent)
            .context("cannot build HTTP client")
    }

    pub(crate) fn crawler(&self) -> Result<Crawler> {
        Ok(Crawler::new(
            self.http_client()?,
            self.config.link_patterns()?,
            CrawlSettings::from_config(&self.config),
        ))
    }

    /// Pipeline with sorting into the configured taxonomy.
    pub(crate) fn pipeline(&self) -> Result<Pipeline> {
        let downloader = Downloader::new(&self.config.download_options(self.show_progress))
            .context("cannot build downloader")?;
        Ok(Pipeline::new(downloader, self.config.archive_filter())
            .with_sorting(self.config.taxonomy()?, &self.config.storage_root))
    }

    /// A fresh `YYYYmmdd_HHMMSS` folder under the download directory.
    pub(crate) fn new_session_dir(&self) -> PathBuf {
        self.config
            .download_dir
            .join(Local::now().format("%Y%m%d_%H%M%S").to_string())
    }
}
