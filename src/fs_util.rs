//! Small filesystem helpers shared by the cache, pipeline and CLI.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the probe file used by [`ensure_writable_dir`].
const WRITE_PROBE: &str = ".write_test";

/// Creates `dir` (and parents) if needed, then checks it accepts new files.
///
/// # Errors
///
/// Returns the underlying IO error if the directory cannot be created or a
/// probe file cannot be written in it.
pub fn ensure_writable_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(WRITE_PROBE);
    std::fs::write(&probe, b"")?;
    std::fs::remove_file(&probe)
}

/// Writes `contents` to `path` through a sibling temp file and a rename.
///
/// The parent directory is created if absent. Readers never observe a
/// half-written file.
///
/// # Errors
///
/// Returns the underlying IO error on failure; the temp file is removed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Moves a file, falling back to copy + remove across filesystems.
///
/// An existing file at `to` is replaced.
///
/// # Errors
///
/// Returns the underlying IO error if neither strategy succeeds.
pub fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)
}

/// Lists the immediate subdirectories of `dir`, sorted by name.
///
/// # Errors
///
/// Returns the underlying IO error if `dir` cannot be listed.
pub fn list_subdirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Formats a byte count for display (`1.5 MB`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_writable_dir_creates_nested_and_leaves_no_probe() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b");
        ensure_writable_dir(&target).unwrap();
        assert!(target.is_dir());
        assert!(!target.join(WRITE_PROBE).exists());
    }

    #[test]
    fn test_ensure_writable_dir_fails_when_path_is_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(ensure_writable_dir(&file).is_err());
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("out.txt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("sub").join("out.txt.tmp").exists());
    }

    #[test]
    fn test_move_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.json");
        let to = dir.path().join("dest").join("a.json");
        std::fs::create_dir_all(to.parent().unwrap()).unwrap();
        std::fs::write(&to, b"old").unwrap();
        std::fs::write(&from, b"new").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"new");
    }

    #[test]
    fn test_list_subdirs_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("c.json"), b"{}").unwrap();
        let dirs = list_subdirs(dir.path()).unwrap();
        assert_eq!(dirs, vec![dir.path().join("a"), dir.path().join("b")]);
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
