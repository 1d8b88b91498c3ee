//! Crawl command: discover links and merge them into the cache.

use std::time::Instant;

use anyhow::Result;
use tracing::info;

use anac_core::crawl::record_known_sources;
use anac_core::dedupe;

use crate::app::context::AppContext;
use crate::cli::KnownKind;

const SAMPLE_LINES: usize = 5;

/// Crawls the catalog, merges new links into the cache, dedupes it and saves
/// it along with the updated known-source lists.
pub(crate) async fn run_crawl_command(ctx: &AppContext, use_known: bool) -> Result<()> {
    let started = Instant::now();
    let crawler = ctx.crawler()?;
    let mut known_datasets = ctx.load_known(KnownKind::Datasets)?;
    let mut known_direct = ctx.load_known(KnownKind::Direct)?;

    println!("Crawling {} ...", ctx.config.base_url);
    let (seed_datasets, seed_direct): (&[String], &[String]) = if use_known {
        (known_datasets.items(), known_direct.items())
    } else {
        (&[], &[])
    };
    let summary = crawler.crawl(seed_datasets, seed_direct).await?;

    let mut cache = ctx.load_link_cache()?;
    let new_links: Vec<String> = summary
        .links
        .iter()
        .filter(|link| !cache.contains(link))
        .cloned()
        .collect();
    let ignored = summary.links.len() - new_links.len();
    cache.extend(new_links.iter().cloned());

    let (deduped, report) = dedupe(cache.links());
    cache.replace(deduped);
    ctx.save_link_cache(&cache)?;

    let (added_datasets, added_direct) =
        record_known_sources(&summary, &mut known_datasets, &mut known_direct);
    ctx.save_known(KnownKind::Datasets, &known_datasets)?;
    ctx.save_known(KnownKind::Direct, &known_direct)?;
    info!(added_datasets, added_direct, "known sources updated");

    println!(
        "Crawl finished in {:.1}s: {} catalog pages, {} dataset pages, {} failed pages",
        started.elapsed().as_secs_f64(),
        summary.catalog_pages,
        summary.dataset_pages.len(),
        summary.failed_pages.len()
    );
    if ignored > 0 {
        println!("Ignored {ignored} links already in the cache.");
    }
    if report.duplicates_found > 0 {
        println!(
            "Removed {} duplicate links ({} -> {}).",
            report.links_removed, report.before, report.after
        );
    }
    println!("New links: {}", new_links.len());
    println!("Links in cache: {}", cache.len());
    for link in new_links.iter().take(SAMPLE_LINES) {
        println!("- {link}");
    }
    if new_links.len() > SAMPLE_LINES {
        println!("... and {} more", new_links.len() - SAMPLE_LINES);
    }
    Ok(())
}
