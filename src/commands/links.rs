//! Link cache commands: show, add, import, export.

use std::path::Path;

use anyhow::{Context, Result};

use anac_core::LinkCache;
use anac_core::fs_util;
use anac_core::links::read_link_lines;

use crate::app::context::AppContext;

/// Links shown when not asked for all of them.
pub(crate) const PREVIEW_LINES: usize = 10;

pub(crate) fn show_links(cache: &LinkCache, all: bool) {
    if cache.is_empty() {
        println!("No links in cache.");
        return;
    }
    println!("{} links in cache.", cache.len());
    let shown = if all { cache.len() } else { PREVIEW_LINES };
    for (index, link) in cache.links().iter().take(shown).enumerate() {
        println!("{}. {link}", index + 1);
    }
    if cache.len() > shown {
        println!("... and {} more", cache.len() - shown);
    }
}

pub(crate) fn run_links_show_command(ctx: &AppContext, all: bool) -> Result<()> {
    show_links(&ctx.load_link_cache()?, all);
    Ok(())
}

/// Adds `urls` to the cache and saves it when anything changed.
pub(crate) fn add_links<I, S>(ctx: &AppContext, urls: I) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let urls: Vec<String> = urls
        .into_iter()
        .map(Into::into)
        .filter(|url| !url.trim().is_empty())
        .collect();
    let mut cache = ctx.load_link_cache()?;
    let added = cache.extend(urls.iter().cloned());
    if added > 0 {
        ctx.save_link_cache(&cache)?;
    }
    let ignored = urls.len() - added;
    if ignored > 0 {
        println!("Ignored {ignored} links already in the cache.");
    }
    Ok(added)
}

pub(crate) fn run_links_add_command(ctx: &AppContext, urls: &[String]) -> Result<()> {
    let added = add_links(ctx, urls.iter().cloned())?;
    report_added(added);
    Ok(())
}

/// Imports a link file (UTF-8, Latin-1 fallback) into the cache.
pub(crate) fn run_links_import_command(ctx: &AppContext, file: &Path) -> Result<()> {
    let lines = read_link_lines(file)
        .with_context(|| format!("cannot import links from {}", file.display()))?;
    println!("Read {} links from {}", lines.len(), file.display());
    let added = add_links(ctx, lines)?;
    report_added(added);
    Ok(())
}

/// Writes the cached links to `file`, one per line.
pub(crate) fn run_links_export_command(ctx: &AppContext, file: &Path) -> Result<()> {
    let cache = ctx.load_link_cache()?;
    export_lines(cache.links().iter(), file)?;
    println!("Exported {} links to {}", cache.len(), file.display());
    Ok(())
}

pub(crate) fn export_lines<'a, I>(lines: I, file: &Path) -> Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    fs_util::write_atomic(file, text.as_bytes())
        .with_context(|| format!("cannot write {}", file.display()))
}

fn report_added(added: usize) {
    if added > 0 {
        println!("Added {added} new links to the cache.");
    } else {
        println!("No new links added.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(dir: &Path) -> AppContext {
        let mut ctx = AppContext::load(&dir.join("config.json"), false).unwrap();
        ctx.config.cache_dir = dir.join("cache");
        ctx
    }

    #[test]
    fn test_add_links_saves_only_new_ones() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        assert_eq!(add_links(&ctx, ["https://x.it/a.json", "https://x.it/b.json"]).unwrap(), 2);
        assert_eq!(add_links(&ctx, ["https://x.it/a.json", ""]).unwrap(), 0);
        assert_eq!(ctx.load_link_cache().unwrap().len(), 2);
    }

    #[test]
    fn test_import_then_export() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let input = dir.path().join("in.txt");
        std::fs::write(&input, "https://x.it/b.json\n\nhttps://x.it/a.json\n").unwrap();

        run_links_import_command(&ctx, &input).unwrap();
        let output = dir.path().join("out.txt");
        run_links_export_command(&ctx, &output).unwrap();
        assert_eq!(
            std::fs::read_to_string(output).unwrap(),
            "https://x.it/a.json\nhttps://x.it/b.json\n"
        );
    }

    #[test]
    fn test_import_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        assert!(run_links_import_command(&ctx, &dir.path().join("absent.txt")).is_err());
    }
}
