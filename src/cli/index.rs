//! `pl index` command
//!
//! # Usage
//! ```bash
//! pl index            # vector index status
//! pl index --rebuild  # re-embed every pearl
//! ```

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::utils::{open_catalog, print_json};

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Rebuild all embeddings
    #[arg(long)]
    pub rebuild: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct IndexStatus {
    vector_search_enabled: bool,
    pearl_count: usize,
    embedding_count: usize,
    indexed_percent: f64,
}

pub fn run(args: IndexArgs) -> Result<()> {
    let catalog = open_catalog()?;
    let store = &catalog.store;

    if args.rebuild {
        if !catalog.config.vector_search.enabled {
            bail!(
                "Vector search is disabled in config.\nSet `vector_search.enabled = true` in {}",
                catalog.paths.config.display()
            );
        }

        let report = store.rebuild_vector_index()?;
        if args.json {
            return print_json(&report);
        }
        if report.total == 0 {
            println!("No pearls to index.");
            return Ok(());
        }
        println!("{} Indexed {}/{} pearls", "✓".green(), report.indexed, report.total);
        if report.failed > 0 {
            println!("  {} {} failed (see log output)", "!".yellow(), report.failed);
        }
        return Ok(());
    }

    let pearl_count = store.index().count()?;
    let embedding_count = store.index().vector_count()?;
    let status = IndexStatus {
        vector_search_enabled: catalog.config.vector_search.enabled,
        pearl_count,
        embedding_count,
        indexed_percent: indexed_percent(embedding_count, pearl_count),
    };

    if args.json {
        return print_json(&status);
    }

    println!("Vector Search Index");
    println!("───────────────────");
    println!("Enabled:     {}", status.vector_search_enabled);
    println!("Dimension:   {}", catalog.config.vector_search.dimension);
    println!("Pearls:      {}", status.pearl_count);
    println!(
        "Indexed:     {} ({:.0}%)",
        status.embedding_count, status.indexed_percent
    );

    if embedding_count < pearl_count {
        println!("\nRun 'pl index --rebuild' to index all pearls.");
    }
    Ok(())
}

fn indexed_percent(indexed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    indexed as f64 / total as f64 * 100.0
}
