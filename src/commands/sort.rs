//! Sort and route commands: place JSON files into the storage taxonomy.

use std::path::Path;

use anyhow::{Context, Result, bail};

use anac_core::router::sort_directory;

use crate::ProcessExit;
use crate::app::context::AppContext;
use crate::app::exit_handler::determine_exit_outcome;

/// Moves every JSON file under `source` into the taxonomy under `root`
/// (default: the configured storage root).
pub(crate) fn run_sort_command(
    ctx: &AppContext,
    source: &Path,
    root: Option<&Path>,
) -> Result<ProcessExit> {
    if !source.is_dir() {
        bail!("Directory {} does not exist.", source.display());
    }
    let root = root.unwrap_or(&ctx.config.storage_root);
    let taxonomy = ctx.config.taxonomy()?;

    let summary = sort_directory(source, root, &taxonomy)
        .with_context(|| format!("cannot sort into {}", root.display()))?;

    println!(
        "Sorted {} files into {} ({} uncategorized).",
        summary.moved.len(),
        root.display(),
        summary.uncategorized
    );
    for (file, error) in &summary.failed {
        println!("FAILED {}: {error}", file.display());
    }
    Ok(determine_exit_outcome(
        summary.moved.len(),
        summary.failed.len(),
    ))
}

/// Prints `<filename> -> <category>` for each name.
pub(crate) fn run_route_command(ctx: &AppContext, filenames: &[String]) -> Result<()> {
    let taxonomy = ctx.config.taxonomy()?;
    for filename in filenames {
        println!("{filename} -> {}", taxonomy.route_or_fallback(filename));
    }
    Ok(())
}
