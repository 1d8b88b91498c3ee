//! ANAC Downloader Core Library
//!
//! This library provides the core functionality for the ANAC open-data
//! downloader, which discovers JSON/ZIP releases on the public-contracts
//! portal, downloads them with resume support, extracts the archives and
//! sorts the results into a fixed folder taxonomy.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`integrity`] - SHA-256 digests and file verification
//! - [`links`] - URL normalization, deduplication, classification and the link cache
//! - [`download`] - Resumable HTTP downloads with retry and backoff
//! - [`archive`] - ZIP extraction with include/exclude filters
//! - [`router`] - Destination taxonomy and file routing
//! - [`pipeline`] - Sequential download → extract → sort batches and reports
//! - [`crawl`] - Static-HTML crawler for the dataset catalog
//! - [`config`] - JSON configuration with defaults and validation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod config;
pub mod crawl;
pub mod download;
pub mod fs_util;
pub mod integrity;
pub mod links;
pub mod pipeline;
pub mod router;

// Re-export commonly used types
pub use archive::{ArchiveError, ArchiveFilter, ExtractionResult, extract};
pub use config::{AppConfig, ConfigError};
pub use crawl::{CrawlError, CrawlSettings, CrawlSummary, Crawler};
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadError, DownloadOptions, DownloadOutcome, DownloadRecord,
    Downloader, FailureType, HttpClient, RetryDecision, RetryPolicy, classify_error,
};
pub use integrity::{VerificationReport, digest, should_download, verify};
pub use links::{
    DedupReport, KnownList, LinkCache, LinkPatterns, dedupe, is_download_link,
    normalize_for_comparison,
};
pub use pipeline::{BatchOptions, BatchReport, ItemResult, ItemStatus, Pipeline, PipelineError};
pub use router::{Category, RouterError, SortSummary, Taxonomy, route};
