//! Verify command: check downloaded files are present and non-empty.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use anac_core::fs_util::{self, format_size};
use anac_core::integrity::verify_directory;
use anac_core::pipeline::REPORTS_DIR;

use crate::ProcessExit;
use crate::app::context::AppContext;
use crate::app::exit_handler::determine_exit_outcome;

/// Subdirectories of the download directory that hold downloads.
pub(crate) fn candidate_dirs(download_dir: &Path) -> Result<Vec<PathBuf>> {
    if !download_dir.is_dir() {
        return Ok(Vec::new());
    }
    let dirs = fs_util::list_subdirs(download_dir)
        .with_context(|| format!("cannot list {}", download_dir.display()))?;
    Ok(dirs
        .into_iter()
        .filter(|d| d.file_name().is_none_or(|n| n != REPORTS_DIR))
        .collect())
}

/// Verifies the `.json`/`.zip` files directly inside `dir` (default: the
/// download directory).
pub(crate) fn run_verify_command(ctx: &AppContext, dir: Option<&Path>) -> Result<ProcessExit> {
    let dir = dir.unwrap_or(&ctx.config.download_dir);
    if !dir.is_dir() {
        bail!("Directory {} does not exist.", dir.display());
    }

    let report = verify_directory(dir)?;
    if report.files.is_empty() {
        println!("No JSON or ZIP files in {}.", dir.display());
        return Ok(ProcessExit::Success);
    }

    println!("Verifying {} files in {}", report.files.len(), dir.display());
    for (index, file) in report.files.iter().enumerate() {
        let name = file
            .path
            .file_name()
            .map_or_else(|| file.path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let mark = if file.valid { "ok     " } else { "INVALID" };
        println!(
            "[{}/{}] {mark} {name} ({})",
            index + 1,
            report.files.len(),
            format_size(file.size)
        );
    }
    println!();
    println!("Valid files:   {}", report.valid_count());
    println!("Invalid files: {}", report.invalid_count());

    Ok(determine_exit_outcome(
        report.valid_count(),
        report.invalid_count(),
    ))
}
