//! Sequential download → extract → sort batches.
//!
//! A [`Pipeline`] takes links one at a time and carries each fully through
//! the stages before touching the next:
//!
//! 1. resolve the link against the portal base URL
//! 2. pick the local filename and skip files already present
//! 3. download with resume and retry
//! 4. extract ZIP archives into a per-archive folder
//! 5. move the resulting JSON files into the storage taxonomy
//!
//! Failures are caught per link and recorded in the [`BatchReport`]; only
//! problems with the session directory itself, the taxonomy folders or the
//! report file abort a batch.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::archive::{self, ArchiveFilter};
use crate::download::filename::{destination_filename, is_zip_url};
use crate::download::{DownloadOutcome, Downloader, partial_path};
use crate::fs_util;
use crate::integrity;
use crate::links;
use crate::router::{self, RouterError, Taxonomy};

/// Name of the report folder inside a session directory.
pub const REPORTS_DIR: &str = "reports";

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The session directory cannot be created or written.
    #[error("session directory {path} is not writable: {source}")]
    SessionDir {
        /// Session directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The storage taxonomy could not be prepared.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// The batch report could not be written.
    #[error("failed to write report {path}: {source}")]
    Report {
        /// Report path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Per-batch settings chosen by the user.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Directory downloads land in.
    pub session_dir: PathBuf,
    /// Re-download files that are already present.
    pub force: bool,
    /// Extract ZIP archives after download.
    pub extract: bool,
    /// Move results into the storage taxonomy.
    pub auto_sort: bool,
    /// Process at most this many links.
    pub limit: Option<usize>,
    /// Write `reports/report_<timestamp>.json` into the session directory.
    pub save_report: bool,
    /// Base URL relative links are resolved against.
    pub base_url: String,
}

/// What happened to one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Downloaded now, or confirmed complete on disk.
    Downloaded,
    /// Already present; nothing fetched.
    Skipped,
    /// Could not be downloaded.
    Failed,
}

/// Per-link result, as recorded in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    /// Link as given.
    pub url: String,
    /// Outcome.
    pub status: ItemStatus,
    /// Local file, when one was chosen.
    pub path: Option<PathBuf>,
    /// Bytes on disk after a download.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    /// SHA-256 of the downloaded file.
    pub sha256: Option<String>,
    /// Files extracted from the archive.
    pub extracted: usize,
    /// Files moved into the storage taxonomy.
    pub sorted: usize,
    /// Error text; set for failures and for downloads whose extraction or
    /// sorting failed.
    pub error: Option<String>,
}

impl ItemResult {
    fn new(url: &str, status: ItemStatus, path: Option<PathBuf>) -> Self {
        Self {
            url: url.to_string(),
            status,
            path,
            bytes: None,
            sha256: None,
            extracted: 0,
            sorted: 0,
            error: None,
        }
    }

    fn failed(url: &str, path: Option<PathBuf>, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(url, ItemStatus::Failed, path)
        }
    }
}

/// Summary of one batch, serialized as the download report.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// When the batch finished.
    pub timestamp: DateTime<Local>,
    /// Links handed to the batch, before `limit`.
    pub total_links: usize,
    /// Links downloaded or confirmed complete.
    pub downloaded: usize,
    /// Links skipped because the file was present.
    pub skipped: usize,
    /// Links that failed.
    pub failed: usize,
    /// Files extracted from archives.
    pub extracted_files: usize,
    /// Files moved into the storage taxonomy.
    pub sorted_files: usize,
    /// Bytes downloaded across the batch.
    pub downloaded_bytes: u64,
    /// Wall-clock duration of the batch.
    pub elapsed_secs: f64,
    /// Links attempted, in order.
    pub links: Vec<String>,
    /// Per-link results, in order.
    pub items: Vec<ItemResult>,
}

impl BatchReport {
    fn new(total_links: usize) -> Self {
        Self {
            timestamp: Local::now(),
            total_links,
            downloaded: 0,
            skipped: 0,
            failed: 0,
            extracted_files: 0,
            sorted_files: 0,
            downloaded_bytes: 0,
            elapsed_secs: 0.0,
            links: Vec::new(),
            items: Vec::new(),
        }
    }

    fn record(&mut self, item: ItemResult) {
        match item.status {
            ItemStatus::Downloaded => self.downloaded += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Failed => self.failed += 1,
        }
        self.extracted_files += item.extracted;
        self.sorted_files += item.sorted;
        self.downloaded_bytes += item.bytes.unwrap_or(0);
        self.links.push(item.url.clone());
        self.items.push(item);
    }

    /// Writes the report to `<session_dir>/reports/report_<timestamp>.json`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Report`] if the file cannot be written.
    pub fn save(&self, session_dir: &Path) -> Result<PathBuf, PipelineError> {
        let path = session_dir.join(REPORTS_DIR).join(format!(
            "report_{}.json",
            self.timestamp.format("%Y%m%d_%H%M%S")
        ));
        let json = serde_json::to_vec_pretty(self).map_err(|e| PipelineError::Report {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        fs_util::write_atomic(&path, &json).map_err(|source| PipelineError::Report {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Storage taxonomy and its root folder.
#[derive(Debug, Clone)]
struct Sorting {
    taxonomy: Taxonomy,
    root: PathBuf,
}

/// Runs download batches.
#[derive(Debug, Clone)]
pub struct Pipeline {
    downloader: Downloader,
    filter: ArchiveFilter,
    sorting: Option<Sorting>,
}

impl Pipeline {
    /// Creates a pipeline without sorting.
    #[must_use]
    pub fn new(downloader: Downloader, filter: ArchiveFilter) -> Self {
        Self {
            downloader,
            filter,
            sorting: None,
        }
    }

    /// Enables sorting into `taxonomy` under `root` for batches that ask
    /// for it.
    #[must_use]
    pub fn with_sorting(mut self, taxonomy: Taxonomy, root: impl Into<PathBuf>) -> Self {
        self.sorting = Some(Sorting {
            taxonomy,
            root: root.into(),
        });
        self
    }

    /// The downloader in use.
    #[must_use]
    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    /// Runs a batch without per-item callbacks.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run_with`].
    pub async fn run(
        &self,
        links: &[String],
        options: &BatchOptions,
    ) -> Result<(BatchReport, Option<PathBuf>), PipelineError> {
        self.run_with(links, options, |_, _, _| {}).await
    }

    /// Runs a batch over the first `options.limit` links, calling
    /// `on_item(index, total, result)` after each one.
    ///
    /// Returns the report and, when `save_report` is set, where it was
    /// written.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::SessionDir`] if the session directory is unusable
    /// - [`PipelineError::Router`] if sorting is requested and the category
    ///   folders cannot be created
    /// - [`PipelineError::Report`] if the report cannot be written
    #[instrument(skip(self, links, on_item), fields(session = %options.session_dir.display(), links = links.len()))]
    pub async fn run_with<F>(
        &self,
        links: &[String],
        options: &BatchOptions,
        mut on_item: F,
    ) -> Result<(BatchReport, Option<PathBuf>), PipelineError>
    where
        F: FnMut(usize, usize, &ItemResult),
    {
        let started = Instant::now();
        fs_util::ensure_writable_dir(&options.session_dir).map_err(|source| {
            PipelineError::SessionDir {
                path: options.session_dir.clone(),
                source,
            }
        })?;

        let sorting = if options.auto_sort {
            match &self.sorting {
                Some(sorting) => {
                    router::ensure_category_dirs(&sorting.root, &sorting.taxonomy)?;
                    Some(sorting)
                }
                None => {
                    warn!("auto-sort requested but no storage taxonomy configured");
                    None
                }
            }
        } else {
            None
        };

        let limit = options.limit.unwrap_or(links.len()).min(links.len());
        let mut report = BatchReport::new(links.len());
        info!(attempting = limit, total = links.len(), "starting batch");

        for (index, link) in links[..limit].iter().enumerate() {
            let item = self.process_link(link, options, sorting).await;
            on_item(index, limit, &item);
            report.record(item);
        }

        report.timestamp = Local::now();
        report.elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed,
            extracted = report.extracted_files,
            sorted = report.sorted_files,
            "batch finished"
        );

        let saved = if options.save_report {
            let path = report.save(&options.session_dir)?;
            info!(path = %path.display(), "report saved");
            Some(path)
        } else {
            None
        };
        Ok((report, saved))
    }

    async fn process_link(
        &self,
        link: &str,
        options: &BatchOptions,
        sorting: Option<&Sorting>,
    ) -> ItemResult {
        let Some(url) = links::resolve(link, &options.base_url) else {
            return ItemResult::failed(link, None, format!("cannot resolve link: {link}"));
        };

        let dest = options.session_dir.join(destination_filename(&url));
        if !integrity::should_download(&dest, None, options.force) {
            debug!(path = %dest.display(), "file already present");
            return ItemResult::new(link, ItemStatus::Skipped, Some(dest));
        }
        if options.force {
            discard_previous(&dest);
        }

        let record = match self.downloader.download(&url, &dest).await {
            Ok(DownloadOutcome::Completed(record) | DownloadOutcome::AlreadyComplete(record)) => {
                record
            }
            Ok(DownloadOutcome::Failed {
                attempts,
                last_error,
            }) => {
                return ItemResult::failed(
                    link,
                    Some(dest),
                    format!("failed after {attempts} attempts: {last_error}"),
                );
            }
            Err(error) => return ItemResult::failed(link, Some(dest), error),
        };

        let mut item = ItemResult {
            bytes: Some(record.bytes),
            sha256: Some(record.sha256),
            ..ItemResult::new(link, ItemStatus::Downloaded, Some(dest.clone()))
        };

        let mut produced = Vec::new();
        if is_zip_url(&url) {
            if options.extract {
                match archive::extract(&dest, &options.session_dir, &self.filter) {
                    Ok(result) => {
                        item.extracted = result.extracted.len();
                        produced = result.extracted;
                    }
                    Err(error) => {
                        warn!(path = %dest.display(), error = %error, "extraction failed");
                        item.error = Some(error.to_string());
                    }
                }
            }
        } else {
            produced.push(dest);
        }

        if let Some(sorting) = sorting {
            for file in produced.iter().filter(|f| is_json_file(f)) {
                match router::place_file(file, &sorting.root, &sorting.taxonomy) {
                    Ok(_) => item.sorted += 1,
                    Err(error) => {
                        warn!(file = %file.display(), error = %error, "sorting failed");
                        item.error.get_or_insert_with(|| error.to_string());
                    }
                }
            }
        }

        item
    }
}

/// Removes an earlier copy and its partial file so a forced run starts fresh.
fn discard_previous(dest: &Path) {
    for path in [dest.to_path_buf(), partial_path(dest)] {
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed previous copy"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => warn!(path = %path.display(), error = %error, "cannot remove previous copy"),
        }
    }
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::DownloadOptions;
    use tempfile::TempDir;

    fn options(session_dir: &Path) -> BatchOptions {
        BatchOptions {
            session_dir: session_dir.to_path_buf(),
            force: false,
            extract: true,
            auto_sort: false,
            limit: None,
            save_report: true,
            base_url: "https://dati.example.it/opendata/dataset".to_string(),
        }
    }

    fn pipeline() -> Pipeline {
        let downloader = Downloader::new(&DownloadOptions::default()).unwrap();
        Pipeline::new(downloader, ArchiveFilter::default())
    }

    #[test]
    fn test_report_counts_and_serializes() {
        let mut report = BatchReport::new(3);
        report.record(ItemResult {
            bytes: Some(10),
            extracted: 2,
            ..ItemResult::new("https://x/a.zip", ItemStatus::Downloaded, None)
        });
        report.record(ItemResult::new("https://x/b.json", ItemStatus::Skipped, None));
        report.record(ItemResult::failed("https://x/c.json", None, "boom"));

        assert_eq!(report.downloaded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.extracted_files, 2);
        assert_eq!(report.downloaded_bytes, 10);

        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "timestamp",
            "total_links",
            "downloaded",
            "skipped",
            "failed",
            "extracted_files",
            "links",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["items"][2]["status"], "failed");
        assert_eq!(json["items"][2]["error"], "boom");
    }

    #[test]
    fn test_report_save_path() {
        let dir = TempDir::new().unwrap();
        let report = BatchReport::new(0);
        let path = report.save(dir.path()).unwrap();
        assert!(path.starts_with(dir.path().join(REPORTS_DIR)));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("report_") && name.ends_with(".json"));
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn test_present_files_are_skipped_without_network() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.json"), b"{}").unwrap();
        let links = vec!["http://127.0.0.1:9/a.json".to_string()];

        let (report, saved) = pipeline().run(&links, &options(dir.path())).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.items[0].status, ItemStatus::Skipped);
        assert!(saved.unwrap().is_file());
    }

    #[tokio::test]
    async fn test_limit_bounds_attempted_links() {
        let dir = TempDir::new().unwrap();
        for name in ["a.json", "b.json", "c.json"] {
            std::fs::write(dir.path().join(name), b"{}").unwrap();
        }
        let links: Vec<String> = ["a.json", "b.json", "c.json"]
            .iter()
            .map(|n| format!("http://127.0.0.1:9/{n}"))
            .collect();
        let opts = BatchOptions {
            limit: Some(2),
            save_report: false,
            ..options(dir.path())
        };

        let mut seen = Vec::new();
        let (report, saved) = pipeline()
            .run_with(&links, &opts, |index, total, _| seen.push((index, total)))
            .await
            .unwrap();
        assert_eq!(report.total_links, 3);
        assert_eq!(report.links.len(), 2);
        assert_eq!(seen, vec![(0, 2), (1, 2)]);
        assert!(saved.is_none());
    }

    #[tokio::test]
    async fn test_unusable_session_dir_aborts_batch() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let result = pipeline().run(&[], &options(&blocker.join("session"))).await;
        assert!(matches!(result, Err(PipelineError::SessionDir { .. })));
    }
}
