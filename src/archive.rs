//! ZIP extraction with include/exclude filtering.
//!
//! Members are filtered by extension pattern before extraction. A member
//! matches extension `e` when its lowercase name ends with `.e` or contains
//! `_e.` (so `c_ttl.json` matches `ttl`). Exclusion always wins over
//! inclusion.
//!
//! Each archive extracts into its own subdirectory named after the archive
//! file stem, e.g. `bando_cig_json.zip` → `<dest>/bando_cig_json/`.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

/// Errors raised while extracting an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive or an output file could not be read or written.
    #[error("IO error extracting {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The archive is not a readable ZIP, or a member is corrupt.
    #[error("corrupt archive {path}: {source}")]
    Corrupt {
        /// Archive path.
        path: PathBuf,
        /// Underlying ZIP error.
        #[source]
        source: zip::result::ZipError,
    },
}

impl ArchiveError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a corrupt-archive error.
    pub fn corrupt(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Corrupt {
            path: path.into(),
            source,
        }
    }
}

/// Which members to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFilter {
    /// Extensions to keep when `include_only` is set.
    pub include: Vec<String>,
    /// Extensions that are always dropped.
    pub exclude: Vec<String>,
    /// Extract only members matching `include`.
    pub include_only: bool,
    /// When `include_only` leaves nothing, extract every non-excluded member.
    pub extract_all_if_no_match: bool,
}

impl Default for ArchiveFilter {
    fn default() -> Self {
        Self {
            include: vec!["json".to_string()],
            exclude: vec!["ttl".to_string(), "csv".to_string(), "xml".to_string()],
            include_only: true,
            extract_all_if_no_match: false,
        }
    }
}

impl ArchiveFilter {
    /// Selects the members to extract, in archive order.
    #[must_use]
    pub fn select<'a>(&self, members: &'a [String]) -> Vec<&'a str> {
        let kept: Vec<&str> = members
            .iter()
            .map(String::as_str)
            .filter(|name| !self.exclude.iter().any(|ext| matches_extension(name, ext)))
            .collect();

        if !self.include_only {
            return kept;
        }

        let included: Vec<&str> = kept
            .iter()
            .copied()
            .filter(|name| self.include.iter().any(|ext| matches_extension(name, ext)))
            .collect();

        // The fallback still honours exclusions.
        if included.is_empty() && self.extract_all_if_no_match {
            return kept;
        }
        included
    }
}

/// True when `name` carries extension `ext` (`.ext` suffix or `_ext.` infix).
#[must_use]
pub fn matches_extension(name: &str, ext: &str) -> bool {
    let name = name.to_lowercase();
    let ext = ext.trim().trim_start_matches('.').to_lowercase();
    if ext.is_empty() {
        return false;
    }
    name.ends_with(&format!(".{ext}")) || name.contains(&format!("_{ext}."))
}

/// True when the path looks like a ZIP archive.
#[must_use]
pub fn is_zip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// What an extraction produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    /// Source archive.
    pub archive: PathBuf,
    /// Subdirectory the members were written to.
    pub dest_dir: PathBuf,
    /// Paths of the extracted files.
    pub extracted: Vec<PathBuf>,
    /// Member count of the archive, before filtering.
    pub total_members: usize,
}

/// Extracts the members of `archive_path` selected by `filter`.
///
/// Files land in `dest_dir/<archive stem>/`, created if absent. Existing
/// files with the same name are overwritten. Members whose path would
/// escape that directory are skipped, as are directory entries.
///
/// # Errors
///
/// Returns [`ArchiveError::Corrupt`] for unreadable archives or members and
/// [`ArchiveError::Io`] when output files cannot be written.
#[instrument(skip(filter), fields(archive = %archive_path.display()))]
pub fn extract(
    archive_path: &Path,
    dest_dir: &Path,
    filter: &ArchiveFilter,
) -> Result<ExtractionResult, ArchiveError> {
    let file = File::open(archive_path).map_err(|e| ArchiveError::io(archive_path, e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| ArchiveError::corrupt(archive_path, e))?;

    let members: Vec<String> = archive.file_names().map(str::to_string).collect();
    let total_members = members.len();
    let selected = filter.select(&members);

    let stem = archive_path
        .file_stem()
        .map_or_else(|| "archive".into(), |s| s.to_string_lossy().into_owned());
    let target = dest_dir.join(stem);
    std::fs::create_dir_all(&target).map_err(|e| ArchiveError::io(&target, e))?;

    if selected.is_empty() {
        warn!(total_members, "no archive member matched the requested formats");
    }

    let mut extracted = Vec::with_capacity(selected.len());
    for name in selected {
        let mut member = archive
            .by_name(name)
            .map_err(|e| ArchiveError::corrupt(archive_path, e))?;
        if member.is_dir() {
            continue;
        }
        let Some(relative) = member.enclosed_name() else {
            warn!(member = name, "skipping member with unsafe path");
            continue;
        };
        let out_path = target.join(relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| ArchiveError::io(&out_path, e))?;
        std::io::copy(&mut member, &mut out).map_err(|e| ArchiveError::io(&out_path, e))?;
        debug!(member = name, path = %out_path.display(), "extracted member");
        extracted.push(out_path);
    }

    info!(
        extracted = extracted.len(),
        total_members,
        dest = %target.display(),
        "archive extracted"
    );

    Ok(ExtractionResult {
        archive: archive_path.to_path_buf(),
        dest_dir: target,
        extracted,
        total_members,
    })
}
