//! Dedupe command: collapse cached links that name the same resource.

use anyhow::Result;

use anac_core::links::find_duplicates;
use anac_core::{DedupReport, dedupe};

use crate::app::context::AppContext;

/// Dedupes the link cache and saves it; optionally lists the clusters first.
pub(crate) fn run_dedupe_command(ctx: &AppContext, list: bool) -> Result<DedupReport> {
    let mut cache = ctx.load_link_cache()?;
    if cache.is_empty() {
        println!("No links in cache. Nothing to deduplicate.");
        return Ok(DedupReport::default());
    }

    if list {
        for cluster in find_duplicates(cache.links()) {
            println!("{}", cluster.normalized);
            for member in &cluster.members {
                let mark = if *member == cluster.canonical { "keep" } else { "drop" };
                println!("  [{mark}] {member}");
            }
        }
    }

    let (deduped, report) = dedupe(cache.links());
    if report.links_removed > 0 {
        cache.replace(deduped);
        ctx.save_link_cache(&cache)?;
        println!(
            "Found {} duplicate groups; removed {} links ({} -> {}).",
            report.duplicates_found, report.links_removed, report.before, report.after
        );
    } else {
        println!("No duplicates found among {} links.", report.before);
    }
    Ok(report)
}
