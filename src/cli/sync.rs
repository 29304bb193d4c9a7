//! `pl sync` command
//!
//! # Usage
//! ```bash
//! pl sync                   # rebuild pearls.db from pearls.jsonl (after git pull)
//! pl sync --to-log          # rewrite pearls.jsonl from the database
//! pl sync --refresh-hashes  # recompute hashes after editing content files
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::open_catalog;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Export the database to the JSONL log instead
    #[arg(long, conflicts_with = "refresh_hashes")]
    pub to_log: bool,

    /// Update content hashes from the content files
    #[arg(long)]
    pub refresh_hashes: bool,
}

pub fn run(args: SyncArgs) -> Result<()> {
    let catalog = open_catalog()?;
    let store = &catalog.store;

    if args.refresh_hashes {
        println!("Refreshing content hashes...");
        let changed = store.refresh_content_hashes()?;
        println!("{} Content hashes updated ({} changed)", "✓".green(), changed);
        return Ok(());
    }

    if args.to_log {
        println!("Exporting database to JSONL...");
        let count = store.sync_to_log()?;
        println!("{} Database exported to JSONL ({} pearls)", "✓".green(), count);
        return Ok(());
    }

    println!("Rebuilding database from JSONL...");
    let count = store.sync_from_log()?;
    println!("{} Database rebuilt ({} pearls)", "✓".green(), count);

    if store.has_embedder() {
        let report = store.rebuild_vector_index()?;
        println!(
            "{} Vector index rebuilt ({}/{} indexed)",
            "✓".green(),
            report.indexed,
            report.total
        );
    }
    Ok(())
}
