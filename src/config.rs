//! JSON configuration with defaults and validation.
//!
//! Every field has a serde default, so a config file only needs the values
//! it changes. A missing file is written out with the defaults on first
//! load; a malformed one is an error, never silently repaired.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::archive::ArchiveFilter;
use crate::download::DownloadOptions;
use crate::download::constants::{
    DEFAULT_BACKOFF, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};
use crate::fs_util;
use crate::links::{LinkPatternConfig, LinkPatterns, PatternError};
use crate::router::{DEFAULT_STORAGE_ROOT, RouterError, Taxonomy};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default catalog page crawled for datasets.
pub const DEFAULT_BASE_URL: &str = "https://dati.anticorruzione.it/opendata/dataset";

const LINK_CACHE_FILE: &str = "json_links.txt";
const KNOWN_DATASETS_FILE: &str = "known_datasets.txt";
const KNOWN_DIRECT_LINKS_FILE: &str = "known_direct_links.txt";

/// Errors loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read or written.
    #[error("IO error on config file {path}: {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for the expected shape.
    #[error("malformed config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A field holds a value outside its allowed range.
    #[error("Invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        /// Field name as written in the file.
        field: &'static str,
        /// Offending value.
        value: String,
        /// Allowed values.
        expected: String,
    },

    /// A configured link pattern is not a valid regex.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// The configured taxonomy file could not be used.
    #[error(transparent)]
    Taxonomy(#[from] RouterError),
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn out_of_range(field: &'static str, value: impl ToString, range: &str) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
            expected: format!("range: {range}"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Catalog page the crawler starts from.
    pub base_url: String,
    /// Main download directory; sessions are subdirectories.
    pub download_dir: PathBuf,
    /// Directory for the link cache and known-source lists.
    pub cache_dir: PathBuf,
    /// Log file appended to by the binary.
    pub log_file: PathBuf,
    /// Streaming block size in bytes.
    pub chunk_size: usize,
    /// Attempts per download.
    pub max_retries: u32,
    /// Backoff base in seconds.
    pub retry_backoff: f64,
    /// Connect/read timeout in seconds.
    pub timeout: u64,
    /// Extract downloaded ZIP archives.
    pub extract_zip_files: bool,
    /// Extract only members matching `include_formats`.
    pub extract_json_only: bool,
    /// Extensions kept when extracting.
    pub include_formats: Vec<String>,
    /// Extensions never extracted.
    pub exclude_formats: Vec<String>,
    /// Extract every non-excluded member when nothing matches.
    pub extract_all_if_no_match: bool,
    /// Write a JSON report per download batch.
    pub save_report: bool,
    /// Sort downloaded files into the storage taxonomy.
    pub auto_sort: bool,
    /// Root of the category folders.
    pub storage_root: PathBuf,
    /// Optional JSON taxonomy replacing the built-in table.
    pub taxonomy_file: Option<PathBuf>,
    /// Catalog pages crawled at most.
    pub max_pages: u32,
    /// User-Agent for every request.
    pub user_agent: String,
    /// Optional override of the link classification patterns.
    pub link_patterns: Option<LinkPatternConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            download_dir: PathBuf::from("downloads"),
            cache_dir: PathBuf::from("cache"),
            log_file: PathBuf::from("log/downloader.log"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_BACKOFF,
            timeout: DEFAULT_TIMEOUT_SECS,
            extract_zip_files: true,
            extract_json_only: true,
            include_formats: vec!["json".to_string()],
            exclude_formats: vec!["ttl".to_string(), "csv".to_string(), "xml".to_string()],
            extract_all_if_no_match: false,
            save_report: true,
            auto_sort: false,
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            taxonomy_file: None,
            max_pages: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            link_patterns: None,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or writes the defaults there when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read or created,
    /// [`ConfigError::Parse`] for malformed JSON and [`ConfigError::Invalid`]
    /// for out-of-range values.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!(path = %path.display(), "created default config file");
            return Ok(config);
        }
        Self::load(path)
    }

    /// Loads and validates an existing config file.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::load_or_create`], except a missing file is an
    /// IO error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Writes the config as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs_util::write_atomic(path, &json).map_err(|e| ConfigError::io(path, e))
    }

    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first bad field and
    /// [`ConfigError::Pattern`] for an unparsable link pattern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1024..=64 * 1024 * 1024).contains(&self.chunk_size) {
            return Err(ConfigError::out_of_range(
                "chunk_size",
                self.chunk_size,
                "1024..=67108864",
            ));
        }
        if !(1..=20).contains(&self.max_retries) {
            return Err(ConfigError::out_of_range(
                "max_retries",
                self.max_retries,
                "1..=20",
            ));
        }
        if !self.retry_backoff.is_finite() || !(0.0..=60.0).contains(&self.retry_backoff) {
            return Err(ConfigError::out_of_range(
                "retry_backoff",
                self.retry_backoff,
                "0..=60",
            ));
        }
        if !(1..=3600).contains(&self.timeout) {
            return Err(ConfigError::out_of_range("timeout", self.timeout, "1..=3600"));
        }
        if !(1..=1000).contains(&self.max_pages) {
            return Err(ConfigError::out_of_range(
                "max_pages",
                self.max_pages,
                "1..=1000",
            ));
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::Invalid {
                field: "base_url",
                value: self.base_url.clone(),
                expected: "an absolute http(s) URL".to_string(),
            });
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "user_agent",
                value: String::new(),
                expected: "a non-empty string".to_string(),
            });
        }
        self.link_patterns()?;
        Ok(())
    }

    /// Downloader tunables derived from this config.
    #[must_use]
    pub fn download_options(&self, show_progress: bool) -> DownloadOptions {
        DownloadOptions {
            chunk_size: self.chunk_size,
            max_retries: self.max_retries,
            backoff: self.retry_backoff,
            timeout: Duration::from_secs(self.timeout),
            user_agent: self.user_agent.clone(),
            show_progress,
        }
    }

    /// Archive member filter derived from this config.
    #[must_use]
    pub fn archive_filter(&self) -> ArchiveFilter {
        ArchiveFilter {
            include: self.include_formats.clone(),
            exclude: self.exclude_formats.clone(),
            include_only: self.extract_json_only,
            extract_all_if_no_match: self.extract_all_if_no_match,
        }
    }

    /// Compiled link classification patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] when an override regex is invalid.
    pub fn link_patterns(&self) -> Result<LinkPatterns, ConfigError> {
        match &self.link_patterns {
            Some(config) => Ok(LinkPatterns::from_config(config)?),
            None => Ok(LinkPatterns::default()),
        }
    }

    /// The configured taxonomy, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Taxonomy`] when `taxonomy_file` cannot be
    /// loaded.
    pub fn taxonomy(&self) -> Result<Taxonomy, ConfigError> {
        match &self.taxonomy_file {
            Some(path) => Ok(Taxonomy::load(path)?),
            None => Ok(Taxonomy::default()),
        }
    }

    /// Link cache file.
    #[must_use]
    pub fn link_cache_path(&self) -> PathBuf {
        self.cache_dir.join(LINK_CACHE_FILE)
    }

    /// Known datasets list.
    #[must_use]
    pub fn known_datasets_path(&self) -> PathBuf {
        self.cache_dir.join(KNOWN_DATASETS_FILE)
    }

    /// Known direct links list.
    #[must_use]
    pub fn known_direct_links_path(&self) -> PathBuf {
        self.cache_dir.join(KNOWN_DIRECT_LINKS_FILE)
    }
}
