use std::io::{self, IsTerminal};

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::app::{context::AppContext, menu, terminal};
use crate::cli::{Args, Command, LinksCommand};
use crate::{ProcessExit, commands};

pub(crate) async fn run_downloader(args: Args) -> Result<ProcessExit> {
    let dumb_terminal = terminal::is_dumb_terminal();
    let show_progress =
        terminal::should_show_progress(io::stderr().is_terminal(), args.quiet, dumb_terminal);
    let ctx = AppContext::load(&args.config, show_progress)?;

    let no_color = terminal::should_disable_color(terminal::no_color_env_requested(), dumb_terminal);
    let log_error = terminal::init_tracing(
        terminal::default_level(args.verbose, args.quiet),
        &ctx.config.log_file,
        no_color,
    );
    if let Some(error) = log_error {
        warn!(path = %ctx.config.log_file.display(), error = %error, "Log file unavailable, logging to stderr only");
    }

    debug!(?args, config = %ctx.config_path.display(), "CLI arguments parsed");

    let Some(command) = args.command else {
        if !io::stdin().is_terminal() {
            bail!("The interactive menu needs a terminal. Use a subcommand instead (see --help).");
        }
        info!("Starting interactive menu");
        menu::run_menu(&ctx).await?;
        return Ok(ProcessExit::Success);
    };

    dispatch(&ctx, command).await
}

async fn dispatch(ctx: &AppContext, command: Command) -> Result<ProcessExit> {
    match command {
        Command::Crawl { no_known } => commands::run_crawl_command(ctx, !no_known).await?,
        Command::Download(args) => return commands::run_download_command(ctx, &args).await,
        Command::Verify { dir } => return commands::run_verify_command(ctx, dir.as_deref()),
        Command::Links { command } => match command {
            LinksCommand::Show { all } => commands::run_links_show_command(ctx, all)?,
            LinksCommand::Add { urls } => commands::run_links_add_command(ctx, &urls)?,
            LinksCommand::Import { file } => commands::run_links_import_command(ctx, &file)?,
            LinksCommand::Export { file } => commands::run_links_export_command(ctx, &file)?,
        },
        Command::Dedupe { list } => {
            commands::run_dedupe_command(ctx, list)?;
        }
        Command::Known { list, command } => commands::run_known_command(ctx, list, &command)?,
        Command::Sort { source, root } => {
            return commands::run_sort_command(ctx, &source, root.as_deref());
        }
        Command::Route { filenames } => commands::run_route_command(ctx, &filenames)?,
    }
    Ok(ProcessExit::Success)
}
