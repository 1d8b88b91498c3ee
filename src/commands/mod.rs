//! CLI command handlers.

mod crawl;
mod dedupe;
mod download;
mod known;
mod links;
mod sort;
mod verify;

pub(crate) use crawl::run_crawl_command;
pub(crate) use dedupe::run_dedupe_command;
pub(crate) use download::{DownloadRequest, print_estimate, run_batch, run_download_command};
pub(crate) use known::{label as known_label, run_known_command, show_known};
pub(crate) use links::{
    run_links_add_command, run_links_export_command, run_links_import_command,
    run_links_show_command, show_links,
};
pub(crate) use sort::{run_route_command, run_sort_command};
pub(crate) use verify::{candidate_dirs, run_verify_command};
