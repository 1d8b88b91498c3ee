//! Download command: run a batch over the cached links.

use std::path::PathBuf;

use anyhow::{Result, bail};

use anac_core::download::default_sample_size;
use anac_core::fs_util::format_size;
use anac_core::{BatchOptions, BatchReport, ItemResult, ItemStatus};

use crate::ProcessExit;
use crate::app::context::AppContext;
use crate::app::exit_handler::determine_exit_outcome;
use crate::cli::DownloadArgs;

/// A batch as requested by the user, before it is resolved against config.
#[derive(Debug, Clone)]
pub(crate) struct DownloadRequest {
    pub(crate) session_dir: PathBuf,
    pub(crate) force: bool,
    pub(crate) extract: bool,
    pub(crate) auto_sort: bool,
    pub(crate) limit: Option<usize>,
    pub(crate) save_report: bool,
}

impl DownloadRequest {
    /// Resolves command-line flags against the config.
    pub(crate) fn from_args(ctx: &AppContext, args: &DownloadArgs) -> Self {
        let session_dir = if args.session {
            ctx.new_session_dir()
        } else {
            ctx.config.download_dir.clone()
        };
        Self {
            session_dir,
            force: args.force,
            extract: ctx.config.extract_zip_files && !args.no_extract,
            auto_sort: args.sort || ctx.config.auto_sort,
            limit: args
                .limit
                .map(|n| usize::try_from(n).unwrap_or(usize::MAX)),
            save_report: ctx.config.save_report && !args.no_report,
        }
    }
}

/// Non-interactive download of the cached links.
pub(crate) async fn run_download_command(
    ctx: &AppContext,
    args: &DownloadArgs,
) -> Result<ProcessExit> {
    let links: Vec<String> = ctx.load_link_cache()?.links().iter().cloned().collect();
    if links.is_empty() {
        bail!("No links in cache. Run `crawl` or `links add` first.");
    }

    let request = DownloadRequest::from_args(ctx, args);
    if args.estimate {
        print_estimate(ctx, &links, request.limit).await?;
    }
    let report = run_batch(ctx, &links, &request).await?;
    Ok(determine_exit_outcome(
        report.downloaded + report.skipped,
        report.failed,
    ))
}

/// Prints the extrapolated size of the links a batch would attempt.
pub(crate) async fn print_estimate(
    ctx: &AppContext,
    links: &[String],
    limit: Option<usize>,
) -> Result<()> {
    let attempted = &links[..limit.unwrap_or(links.len()).min(links.len())];
    let sample = default_sample_size(attempted.len());
    println!("Estimating size from {sample} of {} links...", attempted.len());

    let client = ctx.http_client()?;
    match client.estimate_total_size(attempted, sample).await {
        Some(estimate) => println!(
            "Estimated total: {} (average {} per file, {} of {} sizes known)",
            format_size(estimate.estimated_total_bytes),
            format_size(estimate.average_bytes),
            estimate.known,
            estimate.sampled
        ),
        None => println!("Size could not be estimated."),
    }
    Ok(())
}

/// Runs the pipeline and prints per-item lines and the summary.
pub(crate) async fn run_batch(
    ctx: &AppContext,
    links: &[String],
    request: &DownloadRequest,
) -> Result<BatchReport> {
    let pipeline = ctx.pipeline()?;
    let options = BatchOptions {
        session_dir: request.session_dir.clone(),
        force: request.force,
        extract: request.extract,
        auto_sort: request.auto_sort,
        limit: request.limit,
        save_report: request.save_report,
        base_url: ctx.config.base_url.clone(),
    };

    println!("Downloading into {}", request.session_dir.display());
    let (report, saved) = pipeline
        .run_with(links, &options, |index, total, item| {
            println!("[{}/{total}] {}", index + 1, describe_item(item));
        })
        .await?;

    print_summary(ctx, &report);
    if let Some(path) = saved {
        println!("Report saved to {}", path.display());
    }
    Ok(report)
}

fn describe_item(item: &ItemResult) -> String {
    let name = item
        .path
        .as_ref()
        .and_then(|p| p.file_name())
        .map_or_else(|| item.url.clone(), |n| n.to_string_lossy().into_owned());
    let mut line = match item.status {
        ItemStatus::Downloaded => format!(
            "downloaded {name} ({})",
            format_size(item.bytes.unwrap_or(0))
        ),
        ItemStatus::Skipped => format!("already present: {name}"),
        ItemStatus::Failed => format!("FAILED {name}"),
    };
    if item.extracted > 0 {
        line.push_str(&format!(", {} files extracted", item.extracted));
    }
    if item.sorted > 0 {
        line.push_str(&format!(", {} sorted", item.sorted));
    }
    if let Some(error) = &item.error {
        line.push_str(&format!(": {error}"));
    }
    line
}

fn print_summary(ctx: &AppContext, report: &BatchReport) {
    println!();
    println!("Batch finished in {:.1}s", report.elapsed_secs);
    println!("  Downloaded:      {}", report.downloaded);
    println!("  Already present: {}", report.skipped);
    println!("  Failed:          {}", report.failed);
    if ctx.config.extract_zip_files {
        println!("  Extracted:       {}", report.extracted_files);
    } else {
        println!("  ZIP extraction is disabled in the config.");
    }
    if report.sorted_files > 0 {
        println!("  Sorted:          {}", report.sorted_files);
    }
    if report.downloaded_bytes > 0 {
        println!("  Total size:      {}", format_size(report.downloaded_bytes));
    }
}
