//! Known-source list commands: show, add, remove, export.

use anyhow::{Result, bail};

use anac_core::KnownList;

use crate::app::context::AppContext;
use crate::cli::{KnownCommand, KnownKind};
use crate::commands::links::export_lines;

pub(crate) fn label(kind: KnownKind) -> &'static str {
    match kind {
        KnownKind::Datasets => "known datasets",
        KnownKind::Direct => "known direct links",
    }
}

pub(crate) fn show_known(kind: KnownKind, list: &KnownList) {
    if list.is_empty() {
        println!("No {}.", label(kind));
        return;
    }
    println!("{} {}:", list.len(), label(kind));
    for (index, item) in list.items().iter().enumerate() {
        println!("{}. {item}", index + 1);
    }
}

pub(crate) fn run_known_command(
    ctx: &AppContext,
    kind: KnownKind,
    command: &KnownCommand,
) -> Result<()> {
    let mut list = ctx.load_known(kind)?;
    match command {
        KnownCommand::Show => show_known(kind, &list),
        KnownCommand::Add { url } => {
            if list.add(url.as_str()) {
                ctx.save_known(kind, &list)?;
                println!("Added. {} {} in total.", list.len(), label(kind));
            } else {
                println!("Already listed: {url}");
            }
        }
        KnownCommand::Remove { position } => {
            let removed = usize::try_from(*position)
                .ok()
                .and_then(|p| p.checked_sub(1))
                .and_then(|index| list.remove(index));
            let Some(removed) = removed else {
                bail!(
                    "Position {position} is out of range (1..={}).",
                    list.len()
                );
            };
            ctx.save_known(kind, &list)?;
            println!("Removed: {removed}");
        }
        KnownCommand::Export { file } => {
            export_lines(list.items(), file)?;
            println!("Exported {} {} to {}", list.len(), label(kind), file.display());
        }
    }
    Ok(())
}
