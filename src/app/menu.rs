//! Interactive main menu.
//!
//! Every action maps onto one of the subcommand handlers; errors from an
//! action are printed and the menu comes back.

use std::path::PathBuf;

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use tracing::warn;

use crate::app::context::AppContext;
use crate::cli::{KnownCommand, KnownKind};
use crate::commands::{self, DownloadRequest};

/// Main menu options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MainMenuOption {
    Crawl,
    Download,
    Verify,
    ShowLinks,
    AddLinks,
    ImportLinks,
    Dedupe,
    KnownLists,
    SortDirectory,
    Exit,
}

impl MainMenuOption {
    pub(crate) fn variants() -> &'static [MainMenuOption] {
        &[
            MainMenuOption::Crawl,
            MainMenuOption::Download,
            MainMenuOption::Verify,
            MainMenuOption::ShowLinks,
            MainMenuOption::AddLinks,
            MainMenuOption::ImportLinks,
            MainMenuOption::Dedupe,
            MainMenuOption::KnownLists,
            MainMenuOption::SortDirectory,
            MainMenuOption::Exit,
        ]
    }

    pub(crate) fn display_name(self) -> &'static str {
        match self {
            MainMenuOption::Crawl => "Crawl the portal for new links",
            MainMenuOption::Download => "Download cached links",
            MainMenuOption::Verify => "Verify downloaded files",
            MainMenuOption::ShowLinks => "Show cached links",
            MainMenuOption::AddLinks => "Add links manually",
            MainMenuOption::ImportLinks => "Import links from a file",
            MainMenuOption::Dedupe => "Remove duplicate links",
            MainMenuOption::KnownLists => "Manage known datasets and direct links",
            MainMenuOption::SortDirectory => "Sort a directory into the storage taxonomy",
            MainMenuOption::Exit => "Exit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownMenuOption {
    Show,
    Add,
    Remove,
    Export,
    Back,
}

impl KnownMenuOption {
    fn variants() -> &'static [KnownMenuOption] {
        &[
            KnownMenuOption::Show,
            KnownMenuOption::Add,
            KnownMenuOption::Remove,
            KnownMenuOption::Export,
            KnownMenuOption::Back,
        ]
    }

    fn display_name(self) -> &'static str {
        match self {
            KnownMenuOption::Show => "Show",
            KnownMenuOption::Add => "Add a URL",
            KnownMenuOption::Remove => "Remove an entry",
            KnownMenuOption::Export => "Export to a file",
            KnownMenuOption::Back => "Back to main menu",
        }
    }
}

/// Parses a batch limit: empty or `all` means no limit.
pub(crate) fn parse_limit(input: &str) -> Option<Option<usize>> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("all") {
        return Some(None);
    }
    match input.parse::<usize>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(Some(n)),
    }
}

/// Runs the menu loop until the user picks Exit.
pub(crate) async fn run_menu(ctx: &AppContext) -> Result<()> {
    let theme = ColorfulTheme::default();
    loop {
        let options = MainMenuOption::variants();
        let names: Vec<&str> = options.iter().map(|o| o.display_name()).collect();

        println!("\n{}", style("ANAC Open Data Downloader").cyan().bold());
        let selection = Select::with_theme(&theme)
            .items(&names)
            .default(0)
            .interact()?;

        let outcome = match options[selection] {
            MainMenuOption::Crawl => crawl(ctx, &theme).await,
            MainMenuOption::Download => download(ctx, &theme).await,
            MainMenuOption::Verify => verify(ctx, &theme),
            MainMenuOption::ShowLinks => show_links(ctx, &theme),
            MainMenuOption::AddLinks => add_links(ctx, &theme),
            MainMenuOption::ImportLinks => import_links(ctx, &theme),
            MainMenuOption::Dedupe => dedupe(ctx, &theme),
            MainMenuOption::KnownLists => known_lists(ctx, &theme),
            MainMenuOption::SortDirectory => sort_directory(ctx, &theme),
            MainMenuOption::Exit => {
                println!("{}", style("Exiting...").cyan());
                return Ok(());
            }
        };

        if let Err(error) = outcome {
            warn!(error = %format!("{error:#}"), "menu action failed");
            println!("{}: {error:#}", style("Error").red().bold());
        }
    }
}

async fn crawl(ctx: &AppContext, theme: &ColorfulTheme) -> Result<()> {
    if !Confirm::with_theme(theme)
        .with_prompt(format!("Crawl {} now?", ctx.config.base_url))
        .default(true)
        .interact()?
    {
        return Ok(());
    }
    let use_known = Confirm::with_theme(theme)
        .with_prompt("Also visit the known datasets and direct links?")
        .default(true)
        .interact()?;
    commands::run_crawl_command(ctx, use_known).await
}

async fn download(ctx: &AppContext, theme: &ColorfulTheme) -> Result<()> {
    let links: Vec<String> = ctx.load_link_cache()?.links().iter().cloned().collect();
    if links.is_empty() {
        println!("{}", style("No links in cache. Crawl or add links first.").yellow());
        return Ok(());
    }
    println!("{} links in cache.", links.len());

    let session = Select::with_theme(theme)
        .with_prompt("Download into")
        .items(&["The download directory", "A new session folder"])
        .default(0)
        .interact()?;
    let force = Confirm::with_theme(theme)
        .with_prompt("Re-download files that already exist?")
        .default(false)
        .interact()?;
    let extract = ctx.config.extract_zip_files
        && Confirm::with_theme(theme)
            .with_prompt("Extract ZIP archives?")
            .default(true)
            .interact()?;
    let auto_sort = Confirm::with_theme(theme)
        .with_prompt("Sort JSON files into the storage taxonomy?")
        .default(ctx.config.auto_sort)
        .interact()?;
    let limit_text: String = Input::with_theme(theme)
        .with_prompt("How many links? (a number or 'all')")
        .default("all".to_string())
        .validate_with(|input: &String| {
            parse_limit(input)
                .map(|_| ())
                .ok_or("enter a positive number or 'all'")
        })
        .interact_text()?;
    let limit = parse_limit(&limit_text).flatten();

    if Confirm::with_theme(theme)
        .with_prompt("Estimate the total size first?")
        .default(false)
        .interact()?
    {
        commands::print_estimate(ctx, &links, limit).await?;
    }

    let attempted = limit.unwrap_or(links.len()).min(links.len());
    if !Confirm::with_theme(theme)
        .with_prompt(format!("Download {attempted} links?"))
        .default(true)
        .interact()?
    {
        return Ok(());
    }

    let request = DownloadRequest {
        session_dir: if session == 1 {
            ctx.new_session_dir()
        } else {
            ctx.config.download_dir.clone()
        },
        force,
        extract,
        auto_sort,
        limit,
        save_report: ctx.config.save_report,
    };
    commands::run_batch(ctx, &links, &request).await?;
    Ok(())
}

fn verify(ctx: &AppContext, theme: &ColorfulTheme) -> Result<()> {
    let mut dirs = vec![ctx.config.download_dir.clone()];
    dirs.extend(commands::candidate_dirs(&ctx.config.download_dir)?);
    let names: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();

    let selection = Select::with_theme(theme)
        .with_prompt("Directory to verify")
        .items(&names)
        .default(0)
        .interact()?;
    commands::run_verify_command(ctx, Some(dirs[selection].as_path()))?;
    Ok(())
}

fn show_links(ctx: &AppContext, theme: &ColorfulTheme) -> Result<()> {
    let cache = ctx.load_link_cache()?;
    commands::show_links(&cache, false);
    if cache.is_empty() {
        return Ok(());
    }
    if Confirm::with_theme(theme)
        .with_prompt("Export all links to a file?")
        .default(false)
        .interact()?
    {
        let file: String = Input::with_theme(theme)
            .with_prompt("Export file")
            .default("links_export.txt".to_string())
            .interact_text()?;
        commands::run_links_export_command(ctx, &PathBuf::from(file))?;
    }
    Ok(())
}

fn add_links(ctx: &AppContext, theme: &ColorfulTheme) -> Result<()> {
    println!("Enter one URL per line; an empty line finishes.");
    let mut urls = Vec::new();
    loop {
        let line: String = Input::with_theme(theme)
            .with_prompt("URL")
            .allow_empty(true)
            .interact_text()?;
        if line.trim().is_empty() {
            break;
        }
        urls.push(line.trim().to_string());
    }
    if urls.is_empty() {
        println!("No links entered.");
        return Ok(());
    }
    commands::run_links_add_command(ctx, &urls)
}

fn import_links(ctx: &AppContext, theme: &ColorfulTheme) -> Result<()> {
    let file: String = Input::with_theme(theme)
        .with_prompt("File with one link per line")
        .interact_text()?;
    commands::run_links_import_command(ctx, &PathBuf::from(file.trim()))
}

fn dedupe(ctx: &AppContext, theme: &ColorfulTheme) -> Result<()> {
    if !Confirm::with_theme(theme)
        .with_prompt("Collapse duplicate links in the cache?")
        .default(true)
        .interact()?
    {
        return Ok(());
    }
    let list = Confirm::with_theme(theme)
        .with_prompt("List the duplicate groups?")
        .default(false)
        .interact()?;
    commands::run_dedupe_command(ctx, list)?;
    Ok(())
}

fn known_lists(ctx: &AppContext, theme: &ColorfulTheme) -> Result<()> {
    let kinds = [KnownKind::Datasets, KnownKind::Direct];
    let names: Vec<&str> = kinds.iter().map(|k| commands::known_label(*k)).collect();
    let kind = kinds[Select::with_theme(theme)
        .with_prompt("List")
        .items(&names)
        .default(0)
        .interact()?];

    loop {
        let options = KnownMenuOption::variants();
        let option_names: Vec<&str> = options.iter().map(|o| o.display_name()).collect();
        let command = match options[Select::with_theme(theme)
            .with_prompt(commands::known_label(kind))
            .items(&option_names)
            .default(0)
            .interact()?]
        {
            KnownMenuOption::Show => KnownCommand::Show,
            KnownMenuOption::Add => KnownCommand::Add {
                url: Input::with_theme(theme).with_prompt("URL").interact_text()?,
            },
            KnownMenuOption::Remove => {
                commands::show_known(kind, &ctx.load_known(kind)?);
                KnownCommand::Remove {
                    position: Input::with_theme(theme)
                        .with_prompt("Position to remove")
                        .interact_text()?,
                }
            }
            KnownMenuOption::Export => KnownCommand::Export {
                file: PathBuf::from(
                    Input::<String>::with_theme(theme)
                        .with_prompt("Export file")
                        .interact_text()?,
                ),
            },
            KnownMenuOption::Back => return Ok(()),
        };
        if let Err(error) = commands::run_known_command(ctx, kind, &command) {
            println!("{}: {error:#}", style("Error").red().bold());
        }
    }
}

fn sort_directory(ctx: &AppContext, theme: &ColorfulTheme) -> Result<()> {
    let source: String = Input::with_theme(theme)
        .with_prompt("Directory to sort")
        .default(ctx.config.download_dir.display().to_string())
        .interact_text()?;
    let root: String = Input::with_theme(theme)
        .with_prompt("Storage root")
        .default(ctx.config.storage_root.display().to_string())
        .interact_text()?;
    commands::run_sort_command(
        ctx,
        &PathBuf::from(source),
        Some(PathBuf::from(root).as_path()),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit_accepts_all_and_positive_numbers() {
        assert_eq!(parse_limit(""), Some(None));
        assert_eq!(parse_limit("ALL"), Some(None));
        assert_eq!(parse_limit(" 25 "), Some(Some(25)));
        assert_eq!(parse_limit("0"), None);
        assert_eq!(parse_limit("-3"), None);
        assert_eq!(parse_limit("many"), None);
    }

    #[test]
    fn test_menu_ends_with_exit() {
        let options = MainMenuOption::variants();
        assert_eq!(options.last(), Some(&MainMenuOption::Exit));
        assert!(options.iter().all(|o| !o.display_name().is_empty()));
    }
}
