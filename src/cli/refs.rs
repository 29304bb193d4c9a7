//! `pl refs` command
//!
//! Outgoing references come from the pearl itself; incoming ones are found
//! by scanning other pearls' reference lists.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::utils::{open_catalog, print_json, truncate};
use crate::core::store::Store;

#[derive(Args, Debug)]
pub struct RefsArgs {
    /// Pearl ID
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct RefsOutput<'a> {
    id: &'a str,
    references: &'a [String],
    referenced_by: Vec<String>,
}

pub fn run(args: RefsArgs) -> Result<()> {
    let catalog = open_catalog()?;
    let store = &catalog.store;

    let pearl = store.require(&args.id)?;
    let incoming: Vec<String> = store
        .find_referencing(&pearl.id)?
        .into_iter()
        .map(|p| p.id)
        .collect();

    if args.json {
        return print_json(&RefsOutput {
            id: &pearl.id,
            references: &pearl.references,
            referenced_by: incoming,
        });
    }

    println!("{}\n", pearl.id.bold());

    if pearl.references.is_empty() && incoming.is_empty() {
        println!("No references.");
        return Ok(());
    }

    if !pearl.references.is_empty() {
        println!("References (outgoing):");
        print_edges(store, "→", &pearl.references)?;
    }

    if !incoming.is_empty() {
        if !pearl.references.is_empty() {
            println!();
        }
        println!("Referenced by (incoming):");
        print_edges(store, "←", &incoming)?;
    }

    Ok(())
}

fn print_edges(store: &Store, arrow: &str, ids: &[String]) -> Result<()> {
    let width = ids.iter().map(|id| id.len()).max().unwrap_or(0);
    for id in ids {
        match store.get(id)? {
            Some(p) => println!(
                "  {} {:<width$}  {}  {}",
                arrow,
                id,
                p.pearl_type,
                truncate(&p.description, 40),
                width = width
            ),
            None => println!("  {} {:<width$}  {}", arrow, id, "(not found)".red(), width = width),
        }
    }
    Ok(())
}
