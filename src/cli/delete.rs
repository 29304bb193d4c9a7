//! `pl delete` and `pl archive` commands
//!
//! Delete archives by default; `--force` removes the pearl from every layer.
//!
//! # Usage
//! ```bash
//! pl archive db.postgres.old_table
//! pl delete db.postgres.old_table            # same as archive
//! pl delete db.postgres.old_table --force    # permanent, asks first
//! pl delete db.legacy --force --recursive -y # whole namespace, no prompt
//! ```

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;

use crate::core::index::ListFilter;
use crate::core::pearl::{Pearl, Status};
use crate::core::store::Store;

use super::utils::open_catalog;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Pearl ID (or namespace with --recursive)
    pub id: String,

    /// Permanently delete instead of archiving
    #[arg(short, long)]
    pub force: bool,

    /// Include every pearl under the namespace
    #[arg(short, long)]
    pub recursive: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Pearl ID
    pub id: String,
}

pub fn run_archive(args: ArchiveArgs) -> Result<()> {
    let catalog = open_catalog()?;
    let pearl = archive(&catalog.store, &args.id)?;
    println!("{} Archived pearl: {}", "✓".green(), pearl.id);
    Ok(())
}

pub fn run(args: DeleteArgs) -> Result<()> {
    let catalog = open_catalog()?;
    let store = &catalog.store;

    let targets = collect_targets(store, &args.id, args.recursive)?;

    if !args.force {
        for p in &targets {
            archive(store, &p.id)?;
            println!(
                "{} Archived pearl: {} {}",
                "✓".green(),
                p.id,
                "(use --force to permanently delete)".dimmed()
            );
        }
        return Ok(());
    }

    if !args.yes && !confirm_delete(&targets)? {
        println!("Aborted.");
        return Ok(());
    }

    for p in &targets {
        store.delete(&p.id)?;
        println!("{} Deleted pearl: {}", "✓".green(), p.id);
    }
    Ok(())
}

fn archive(store: &Store, id: &str) -> Result<Pearl> {
    let mut pearl = store.require(id)?;
    pearl.status = Status::Archived;
    Ok(store.update(pearl, None)?)
}

/// The pearl itself plus, when recursive, everything under its namespace
fn collect_targets(store: &Store, id: &str, recursive: bool) -> Result<Vec<Pearl>> {
    if !recursive {
        return Ok(vec![store.require(id)?]);
    }

    let mut targets = store.list(&ListFilter {
        namespace: Some(id.to_string()),
        ..Default::default()
    })?;
    if let Some(p) = store.get(id)? {
        targets.push(p);
    }

    if targets.is_empty() {
        bail!("No pearls found in namespace: {}", id);
    }
    Ok(targets)
}

fn confirm_delete(targets: &[Pearl]) -> Result<bool> {
    let prompt = match targets {
        [single] => format!("Permanently delete {}?", single.id),
        _ => {
            println!("This will permanently delete {} pearl(s):", targets.len());
            for p in targets {
                println!("  - {}", p.id);
            }
            "Continue?".to_string()
        }
    };

    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
