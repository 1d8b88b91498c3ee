//! Resumable HTTP downloads for portal resources.
//!
//! This module downloads one URL at a time to a fixed destination path,
//! resuming partial files with HTTP range requests and hashing the content
//! with SHA-256 as it streams.
//!
//! # Features
//!
//! - Streaming downloads in configurable blocks (memory stays bounded)
//! - Resume from a `.part` file, restart when the server ignores ranges
//! - One parameterized [`RetryPolicy`] with `base^attempt` backoff
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use anac_core::download::{DownloadOptions, DownloadOutcome, Downloader};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Downloader::new(&DownloadOptions::default())?;
//! let outcome = downloader
//!     .download("https://example.com/bando_cig_json.zip", Path::new("./downloads/bando_cig_json.zip"))
//!     .await?;
//! if let DownloadOutcome::Completed(record) = outcome {
//!     println!("sha256 {}", record.sha256);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod estimate;
pub mod filename;
mod resumable;
mod retry;

pub use client::HttpClient;
pub use constants::DEFAULT_MAX_RETRIES;
pub use error::DownloadError;
pub use estimate::{SizeEstimate, default_sample_size};
pub use resumable::{DownloadOptions, DownloadOutcome, DownloadRecord, Downloader, partial_path};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};

// Note: no module-local Result alias.
// Use `Result<T, DownloadError>` explicitly in function signatures.
