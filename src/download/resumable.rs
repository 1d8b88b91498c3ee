//! Resumable single-file downloads with retry, backoff and SHA-256.
//!
//! One call to [`Downloader::download`] handles one URL:
//!
//! 1. A best-effort HEAD learns the total length.
//! 2. A non-empty destination at least that long is reported as
//!    [`DownloadOutcome::AlreadyComplete`] without any GET.
//! 3. Otherwise a GET resumes from the length of `<dest>.part` with a `Range`
//!    header. If the server ignores the range (or answers 416), the partial
//!    file is discarded and the attempt restarts from zero.
//! 4. The body is streamed to `<dest>.part` in `chunk_size` blocks while a
//!    running SHA-256 (primed with the existing bytes when resuming) is
//!    updated. A complete body is renamed onto `dest`.
//! 5. Transient failures sleep per the [`RetryPolicy`] and retry from step 3,
//!    keeping the partial bytes.
//!
//! A file at `dest` is therefore always a finished download; an interrupted
//! run leaves only the `.part` file, which the next call resumes.
//!
//! Exhausting the attempt budget is not an error: it yields
//! [`DownloadOutcome::Failed`]. Only unrecoverable conditions such as an
//! unwritable destination come back as `Err`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::{HttpClient, derive_total_content_length};
use super::constants::{
    DEFAULT_BACKOFF, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT, PROGRESS_UPDATE_INTERVAL,
};
use super::error::DownloadError;
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use crate::fs_util;

/// Tunables for a [`Downloader`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Streaming block size in bytes.
    pub chunk_size: usize,
    /// Total attempts per download.
    pub max_retries: u32,
    /// Backoff base: failed attempt `n` sleeps `backoff^n` seconds.
    pub backoff: f64,
    /// Connect/read timeout.
    pub timeout: Duration,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            show_progress: false,
        }
    }
}

/// What a finished download produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    /// Source URL.
    pub url: String,
    /// Destination file.
    pub path: PathBuf,
    /// Bytes on disk.
    pub bytes: u64,
    /// Length announced by the server, when known.
    pub expected_len: Option<u64>,
    /// Lowercase hex SHA-256 of the file.
    pub sha256: String,
    /// Offset the final attempt resumed from (0 for a fresh download).
    pub resumed_from: u64,
}

/// Result of one [`Downloader::download`] call.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The body was fully received and written.
    Completed(DownloadRecord),
    /// The file on disk was already at least as long as the remote resource.
    AlreadyComplete(DownloadRecord),
    /// Every attempt failed with a retryable error.
    Failed {
        /// Attempts made.
        attempts: u32,
        /// Error from the last attempt.
        last_error: DownloadError,
    },
}

impl DownloadOutcome {
    /// The record, unless the download failed.
    #[must_use]
    pub fn record(&self) -> Option<&DownloadRecord> {
        match self {
            Self::Completed(record) | Self::AlreadyComplete(record) => Some(record),
            Self::Failed { .. } => None,
        }
    }

    /// Digest of the file, unless the download failed.
    #[must_use]
    pub fn sha256(&self) -> Option<&str> {
        self.record().map(|r| r.sha256.as_str())
    }
}

/// Resumable downloader.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: HttpClient,
    policy: RetryPolicy,
    chunk_size: usize,
    show_progress: bool,
}

impl Downloader {
    /// Builds a downloader with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the HTTP client cannot be built.
    pub fn new(options: &DownloadOptions) -> Result<Self, DownloadError> {
        let client = HttpClient::with_settings(options.timeout, &options.user_agent)?;
        Ok(Self::with_client(client, options))
    }

    /// Builds a downloader around an existing client.
    #[must_use]
    pub fn with_client(client: HttpClient, options: &DownloadOptions) -> Self {
        Self {
            client,
            policy: RetryPolicy::new(options.max_retries, options.backoff),
            chunk_size: options.chunk_size.max(1),
            show_progress: options.show_progress,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Downloads `url` to `dest`, resuming any partial file.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] if `url` does not parse
    /// - [`DownloadError::Destination`] if the parent directory cannot be
    ///   created or written
    /// - [`DownloadError::Io`] for permission errors while writing
    ///
    /// Retryable failures never surface as `Err`; see [`DownloadOutcome::Failed`].
    #[instrument(skip(self), fields(dest = %dest.display()))]
    pub async fn download(&self, url: &str, dest: &Path) -> Result<DownloadOutcome, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_util::ensure_writable_dir(parent)
                .map_err(|e| DownloadError::destination(parent, e))?;
        }

        let total_hint = self.client.head_content_length(url).await;
        if let Some(total) = total_hint {
            debug!(total, "HEAD reported length");
        }

        let part = partial_path(dest);
        let progress = self.progress_bar();
        let mut attempt: u32 = 1;

        loop {
            if let Some(total) = total_hint {
                let on_disk = file_len(dest).await;
                let partial = file_len(&part).await;
                if partial > 0 && partial >= total && on_disk < total {
                    debug!(partial, "partial file already holds the whole body");
                    finalize(&part, dest).await?;
                }
                let existing = file_len(dest).await;
                if existing > 0 && existing >= total {
                    let (sha256, bytes) = hash_file(dest).await?;
                    progress.finish_and_clear();
                    info!(url, bytes, "file already complete");
                    return Ok(DownloadOutcome::AlreadyComplete(DownloadRecord {
                        url: url.to_string(),
                        path: dest.to_path_buf(),
                        bytes,
                        expected_len: Some(total),
                        sha256,
                        resumed_from: existing,
                    }));
                }
            }

            let existing = file_len(&part).await;
            let error = match self
                .attempt(url, dest, &part, existing, total_hint, &progress)
                .await
            {
                Ok(record) => {
                    progress.finish_and_clear();
                    info!(
                        url,
                        bytes = record.bytes,
                        resumed_from = record.resumed_from,
                        sha256 = %record.sha256,
                        "download complete"
                    );
                    return Ok(DownloadOutcome::Completed(record));
                }
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            if failure_type == FailureType::Permanent {
                progress.abandon();
                return Err(error);
            }

            match self.policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        url,
                        attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_secs = delay.as_secs_f64(),
                        error = %error,
                        "download attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    progress.abandon();
                    warn!(url, attempt, reason = %reason, error = %error, "download failed");
                    return Ok(DownloadOutcome::Failed {
                        attempts: attempt,
                        last_error: error,
                    });
                }
            }
        }
    }

    /// One GET attempt from the current offset of the partial file.
    async fn attempt(
        &self,
        url: &str,
        dest: &Path,
        part: &Path,
        existing: u64,
        total_hint: Option<u64>,
        progress: &ProgressBar,
    ) -> Result<DownloadRecord, DownloadError> {
        let range_start = (existing > 0).then_some(existing);
        let response = match self.client.get(url, range_start).await {
            Err(DownloadError::HttpStatus { status: 416, .. }) if existing > 0 => {
                debug!(existing, "range not satisfiable, restarting from zero");
                self.client.get(url, None).await?
            }
            other => other?,
        };
        let resumed = existing > 0 && response.status() == StatusCode::PARTIAL_CONTENT;

        let mut hasher = Sha256::new();
        let (file, offset) = if resumed {
            let primed = prime_hasher(part, &mut hasher).await?;
            let file = OpenOptions::new()
                .append(true)
                .open(part)
                .await
                .map_err(|e| DownloadError::io(part, e))?;
            debug!(offset = primed, "resuming partial download");
            (file, primed)
        } else {
            if existing > 0 {
                debug!(
                    status = response.status().as_u16(),
                    "server ignored range request, restarting from zero"
                );
            }
            let file = File::create(part)
                .await
                .map_err(|e| DownloadError::io(part, e))?;
            (file, 0)
        };

        let expected_len = derive_total_content_length(&response, offset).or(total_hint);
        if let Some(total) = expected_len {
            progress.set_length(total);
        }
        progress.set_position(offset);

        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut stream = response.bytes_stream();
        let mut written = offset;
        let mut last_update = Instant::now();
        let mut bytes_since_update: u64 = 0;

        let streamed: Result<(), DownloadError> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| DownloadError::network(url, e))?;
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(|e| DownloadError::io(part, e))?;
                hasher.update(&chunk);
                written += chunk.len() as u64;
                bytes_since_update += chunk.len() as u64;

                let elapsed = last_update.elapsed();
                if elapsed >= PROGRESS_UPDATE_INTERVAL {
                    update_progress(progress, written, expected_len, bytes_since_update, elapsed);
                    last_update = Instant::now();
                    bytes_since_update = 0;
                }
            }
            Ok(())
        }
        .await;

        // Keep whatever arrived on disk so the next attempt can resume.
        let flushed = writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(part, e));
        streamed?;
        flushed?;

        if let Some(expected) = expected_len
            && written < expected
        {
            return Err(DownloadError::incomplete(part, expected, written));
        }

        drop(writer);
        finalize(part, dest).await?;

        progress.set_position(written);
        Ok(DownloadRecord {
            url: url.to_string(),
            path: dest.to_path_buf(),
            bytes: written,
            expected_len,
            sha256: hex::encode(hasher.finalize()),
            resumed_from: offset,
        })
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {bytes}/{total_bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    }
}

/// Updates throughput and ETA; called at most once per interval.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn update_progress(
    progress: &ProgressBar,
    written: u64,
    total: Option<u64>,
    bytes_since_update: u64,
    elapsed: Duration,
) {
    let speed = bytes_since_update as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    let eta = match total {
        Some(total) if speed > 0.0 && total > written => {
            let secs = ((total - written) as f64 / speed) as u64;
            format!("ETA {}", format_eta(secs))
        }
        Some(_) => "ETA 0s".to_string(),
        None => "ETA unknown".to_string(),
    };
    progress.set_position(written);
    progress.set_message(format!(
        "{}/s {eta}",
        fs_util::format_size(speed as u64)
    ));
}

fn format_eta(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Where the body of `dest` is streamed until it is complete.
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Moves a completed partial file onto its destination.
async fn finalize(part: &Path, dest: &Path) -> Result<(), DownloadError> {
    tokio::fs::rename(part, dest)
        .await
        .map_err(|e| DownloadError::io(dest, e))
}

async fn file_len(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| if meta.is_file() { meta.len() } else { 0 })
        .unwrap_or(0)
}

/// Feeds the existing bytes of `path` into `hasher`; returns how many.
async fn prime_hasher(path: &Path, hasher: &mut Sha256) -> Result<u64, DownloadError> {
    let mut file = File::open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut buffer = vec![0_u8; crate::integrity::DIGEST_CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total += read as u64;
    }
    Ok(total)
}

async fn hash_file(path: &Path) -> Result<(String, u64), DownloadError> {
    let mut hasher = Sha256::new();
    let bytes = prime_hasher(path, &mut hasher).await?;
    Ok((hex::encode(hasher.finalize()), bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(5), "5s");
        assert_eq!(format_eta(125), "2m05s");
        assert_eq!(format_eta(3_725), "1h02m05s");
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("downloads/a_json.zip")),
            PathBuf::from("downloads/a_json.zip.part")
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let record = DownloadRecord {
            url: "https://x.com/a.json".to_string(),
            path: PathBuf::from("a.json"),
            bytes: 2,
            expected_len: Some(2),
            sha256: "ab".to_string(),
            resumed_from: 0,
        };
        let done = DownloadOutcome::Completed(record.clone());
        assert_eq!(done.sha256(), Some("ab"));
        assert_eq!(done.record(), Some(&record));

        let failed = DownloadOutcome::Failed {
            attempts: 3,
            last_error: DownloadError::timeout("https://x.com/a.json"),
        };
        assert!(failed.record().is_none());
        assert!(failed.sha256().is_none());
    }

    #[tokio::test]
    async fn test_download_rejects_invalid_url() {
        let downloader = Downloader::new(&DownloadOptions::default()).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let result = downloader
            .download("not a url", &dir.path().join("a.json"))
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_download_unwritable_destination_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not dir").unwrap();

        let downloader = Downloader::new(&DownloadOptions::default()).unwrap();
        let result = downloader
            .download("http://127.0.0.1:9/a.json", &blocker.join("a.json"))
            .await;
        assert!(matches!(result, Err(DownloadError::Destination { .. })));
    }
}
