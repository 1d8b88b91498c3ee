//! SHA-256 digests and on-disk file verification.
//!
//! Digests are computed by streaming the file through a [`Sha256`] accumulator
//! in [`DIGEST_CHUNK_SIZE`] blocks, so memory use is bounded regardless of the
//! file size.
//!
//! [`verify`] without an expected digest only checks that the file exists and
//! is non-empty. That is a weak heuristic, not proof that the content is
//! correct.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Block size used when hashing files (1 MiB).
pub const DIGEST_CHUNK_SIZE: usize = 1024 * 1024;

/// File extensions considered by [`verify_directory`].
const VERIFIABLE_EXTENSIONS: &[&str] = &["json", "zip"];

/// Errors raised while hashing or listing files.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The file or directory could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl IntegrityError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Computes the lowercase hex SHA-256 digest of a file.
///
/// # Errors
///
/// Returns [`IntegrityError::Io`] if the file cannot be opened or read.
#[instrument(level = "debug", fields(path = %path.display()))]
pub fn digest(path: &Path) -> Result<String, IntegrityError> {
    let mut file = File::open(path).map_err(|e| IntegrityError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; DIGEST_CHUNK_SIZE];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| IntegrityError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Checks whether a downloaded file looks valid.
///
/// Missing and zero-length files are always invalid, whatever the expected
/// digest. With `expected_digest`, the file is valid only when its digest
/// matches (hex case is ignored); a hashing failure counts as invalid.
#[must_use]
pub fn verify(path: &Path, expected_digest: Option<&str>) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() || meta.len() == 0 {
        return false;
    }

    let Some(expected) = expected_digest else {
        return true;
    };

    match digest(path) {
        Ok(actual) => actual.eq_ignore_ascii_case(expected.trim()),
        Err(error) => {
            warn!(path = %path.display(), error = %error, "digest failed during verification");
            false
        }
    }
}

/// Decides whether a destination file must be (re-)downloaded.
///
/// - `force` always re-downloads.
/// - A missing file is downloaded.
/// - With an expected digest, a mismatch or a hashing failure re-downloads.
/// - Otherwise an existing non-empty file is kept.
#[must_use]
pub fn should_download(path: &Path, expected_digest: Option<&str>, force: bool) -> bool {
    if force {
        return true;
    }
    let Ok(meta) = std::fs::metadata(path) else {
        return true;
    };
    if let Some(expected) = expected_digest {
        return match digest(path) {
            Ok(actual) => !actual.eq_ignore_ascii_case(expected.trim()),
            Err(_) => true,
        };
    }
    meta.len() == 0
}

/// Verification status of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// Verified file.
    pub path: PathBuf,
    /// Size on disk in bytes.
    pub size: u64,
    /// Result of [`verify`] without an expected digest.
    pub valid: bool,
}

/// Outcome of verifying every JSON/ZIP file in a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Per-file results, sorted by path.
    pub files: Vec<FileStatus>,
}

impl VerificationReport {
    /// Number of files that passed verification.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.files.iter().filter(|f| f.valid).count()
    }

    /// Number of files that failed verification.
    #[must_use]
    pub fn invalid_count(&self) -> usize {
        self.files.len() - self.valid_count()
    }

    /// Files that failed verification.
    pub fn invalid(&self) -> impl Iterator<Item = &FileStatus> {
        self.files.iter().filter(|f| !f.valid)
    }
}

/// Verifies the `.json` and `.zip` files directly inside `dir`.
///
/// Subdirectories are not descended into.
///
/// # Errors
///
/// Returns [`IntegrityError::Io`] if the directory cannot be listed.
#[instrument(level = "debug", fields(dir = %dir.display()))]
pub fn verify_directory(dir: &Path) -> Result<VerificationReport, IntegrityError> {
    let entries = std::fs::read_dir(dir).map_err(|e| IntegrityError::io(dir, e))?;
    let mut files = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| IntegrityError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() || !has_verifiable_extension(&path) {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let valid = verify(&path, None);
        debug!(path = %path.display(), size, valid, "verified file");
        files.push(FileStatus { path, size, valid });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(VerificationReport { files })
}

fn has_verifiable_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VERIFIABLE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    // ==================== digest Tests ====================

    #[test]
    fn test_digest_known_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        assert_eq!(digest(&path).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        let content: Vec<u8> = (0..(DIGEST_CHUNK_SIZE * 2 + 17))
            .map(|i| (i % 251) as u8)
            .collect();
        std::fs::write(&path, &content).unwrap();

        let first = digest(&path).unwrap();
        let second = digest(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, hex::encode(Sha256::digest(&content)));
    }

    #[test]
    fn test_digest_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = digest(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(IntegrityError::Io { .. })));
    }

    // ==================== verify Tests ====================

    #[test]
    fn test_verify_zero_byte_file_is_false_regardless_of_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, b"").unwrap();
        let empty_digest = hex::encode(Sha256::digest(b""));

        assert!(!verify(&path, None));
        assert!(!verify(&path, Some(&empty_digest)));
        assert!(!verify(&path, Some(HELLO_SHA256)));
    }

    #[test]
    fn test_verify_missing_file_is_false() {
        let dir = TempDir::new().unwrap();
        assert!(!verify(&dir.path().join("nope.json"), None));
    }

    #[test]
    fn test_verify_non_empty_without_digest_is_true() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, b"{}").unwrap();
        assert!(verify(&path, None));
    }

    #[test]
    fn test_verify_with_matching_and_mismatching_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        assert!(verify(&path, Some(HELLO_SHA256)));
        assert!(verify(&path, Some(&HELLO_SHA256.to_uppercase())));
        assert!(!verify(&path, Some("deadbeef")));
    }

    // ==================== should_download Tests ====================

    #[test]
    fn test_should_download_rules() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.json");
        let empty = dir.path().join("empty.json");
        std::fs::write(&present, b"hello").unwrap();
        std::fs::write(&empty, b"").unwrap();

        assert!(should_download(&dir.path().join("missing.json"), None, false));
        assert!(!should_download(&present, None, false));
        assert!(should_download(&present, None, true));
        assert!(should_download(&empty, None, false));
        assert!(!should_download(&present, Some(HELLO_SHA256), false));
        assert!(should_download(&present, Some("deadbeef"), false));
    }

    // ==================== verify_directory Tests ====================

    #[test]
    fn test_verify_directory_counts_only_json_and_zip() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("good.json"), b"[1]").unwrap();
        std::fs::write(dir.path().join("bad.zip"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let report = verify_directory(dir.path()).unwrap();
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.valid_count(), 1);
        assert_eq!(report.invalid_count(), 1);
        let invalid: Vec<_> = report.invalid().collect();
        assert!(invalid[0].path.ends_with("bad.zip"));
    }

    #[test]
    fn test_verify_directory_missing_dir_errors() {
        let dir = TempDir::new().unwrap();
        assert!(verify_directory(&dir.path().join("absent")).is_err());
    }
}
