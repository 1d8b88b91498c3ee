//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use anac_core::config::DEFAULT_CONFIG_FILE;

/// Download and organize the ANAC public-contracts open data.
///
/// Crawls the open-data catalog for JSON/ZIP releases, downloads them with
/// resume support, extracts the archives and sorts the JSON files into the
/// storage taxonomy. Run without a subcommand for the interactive menu.
#[derive(Parser, Debug)]
#[command(name = "anac-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (created with defaults if missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Non-interactive entry points, one per menu action.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Crawl the catalog and merge new links into the cache
    Crawl {
        /// Skip the known datasets and direct links
        #[arg(long)]
        no_known: bool,
    },

    /// Download cached links
    Download(DownloadArgs),

    /// Verify downloaded JSON/ZIP files
    Verify {
        /// Directory to check (defaults to the download directory)
        dir: Option<PathBuf>,
    },

    /// Inspect and edit the link cache
    Links {
        #[command(subcommand)]
        command: LinksCommand,
    },

    /// Collapse cached links that differ only in spelling
    Dedupe {
        /// List the duplicate clusters
        #[arg(long)]
        list: bool,
    },

    /// Manage the known datasets and direct links
    Known {
        /// Which list to manage
        #[arg(value_enum)]
        list: KnownKind,
        #[command(subcommand)]
        command: KnownCommand,
    },

    /// Sort JSON files from a directory into the storage taxonomy
    Sort {
        /// Directory to sort
        source: PathBuf,
        /// Storage root (defaults to the configured one)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Print the category each filename routes to
    Route {
        /// Filenames to classify
        #[arg(required = true)]
        filenames: Vec<String>,
    },
}

/// Options for a download batch.
#[derive(ClapArgs, Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadArgs {
    /// Download into a new timestamped session folder
    #[arg(long)]
    pub session: bool,

    /// Re-download files that already exist
    #[arg(short, long)]
    pub force: bool,

    /// Do not extract ZIP archives
    #[arg(long)]
    pub no_extract: bool,

    /// Sort results into the storage taxonomy
    #[arg(long)]
    pub sort: bool,

    /// Download at most this many links
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// Estimate the batch size before downloading
    #[arg(long)]
    pub estimate: bool,

    /// Do not write a batch report
    #[arg(long)]
    pub no_report: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum LinksCommand {
    /// Print cached links
    Show {
        /// Print every link instead of the first 10
        #[arg(long)]
        all: bool,
    },
    /// Add links to the cache
    Add {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Import links from a file, one per line
    Import { file: PathBuf },
    /// Export cached links to a file
    Export { file: PathBuf },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownKind {
    /// Dataset pages visited on every crawl
    Datasets,
    /// Download links added on every crawl
    Direct,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KnownCommand {
    /// Print the list
    Show,
    /// Append a URL
    Add { url: String },
    /// Remove the entry at a 1-based position
    Remove {
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        position: u64,
    },
    /// Export the list to a file
    Export { file: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["anac-downloader"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.config, PathBuf::from("config.json"));
        assert!(args.command.is_none());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["anac-downloader", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["anac-downloader", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_and_config_flags() {
        let args = Args::try_parse_from(["anac-downloader", "-q", "-c", "other.json"]).unwrap();
        assert!(args.quiet);
        assert_eq!(args.config, PathBuf::from("other.json"));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["anac-downloader", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["anac-downloader", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["anac-downloader", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    // ==================== Subcommand Tests ====================

    #[test]
    fn test_cli_download_args() {
        let args = Args::try_parse_from([
            "anac-downloader",
            "download",
            "--session",
            "-f",
            "-n",
            "5",
            "--no-extract",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Some(Command::Download(DownloadArgs {
                session: true,
                force: true,
                no_extract: true,
                limit: Some(5),
                ..DownloadArgs::default()
            }))
        );
    }

    #[test]
    fn test_cli_download_limit_must_be_positive() {
        let result = Args::try_parse_from(["anac-downloader", "download", "-n", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["anac-downloader", "dedupe", "--list", "-c", "x.json"]).unwrap();
        assert_eq!(args.config, PathBuf::from("x.json"));
        assert_eq!(args.command, Some(Command::Dedupe { list: true }));
    }

    #[test]
    fn test_cli_known_remove_position() {
        let args =
            Args::try_parse_from(["anac-downloader", "known", "direct", "remove", "2"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Known {
                list: KnownKind::Direct,
                command: KnownCommand::Remove { position: 2 },
            })
        );
        assert!(
            Args::try_parse_from(["anac-downloader", "known", "datasets", "remove", "0"]).is_err()
        );
    }

    #[test]
    fn test_cli_route_requires_filenames() {
        assert!(Args::try_parse_from(["anac-downloader", "route"]).is_err());
        let args =
            Args::try_parse_from(["anac-downloader", "route", "a.json", "b.json"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Route {
                filenames: vec!["a.json".into(), "b.json".into()]
            })
        );
    }

    #[test]
    fn test_cli_links_subcommands() {
        let args = Args::try_parse_from(["anac-downloader", "links", "show", "--all"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Links {
                command: LinksCommand::Show { all: true }
            })
        );
    }
}
