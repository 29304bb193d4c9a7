//! `pl context` and `pl clutch` commands
//!
//! Render pearls as one markdown document for an agent's context window.
//!
//! # Usage
//! ```bash
//! pl context db.users db.orders --with-refs   # pull by ID
//! pl context --for src/models/user.rs         # push by file path (globs)
//! pl context --scope payments --brief         # push by scope, metadata only
//! pl clutch                                   # every required pearl
//! ```

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use super::list::PearlList;
use super::utils::{open_catalog, print_json};
use crate::core::retrieval;

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Pearl IDs
    pub ids: Vec<String>,

    /// Also include pearls referenced by the given IDs
    #[arg(long)]
    pub with_refs: bool,

    /// Only include metadata, not full content
    #[arg(long)]
    pub brief: bool,

    /// File path to match against pearl globs (can be repeated)
    #[arg(long = "for", value_name = "PATH")]
    pub paths: Vec<String>,

    /// Scope to include (can be repeated)
    #[arg(long = "scope")]
    pub scopes: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ClutchArgs {
    /// Only include metadata, not full content
    #[arg(long)]
    pub brief: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ContextArgs) -> Result<()> {
    if args.ids.is_empty() && args.paths.is_empty() && args.scopes.is_empty() {
        bail!("Nothing to retrieve: pass pearl IDs, --for <path>, or --scope <scope>");
    }

    let catalog = open_catalog()?;
    let store = &catalog.store;

    let (by_id, missing) = retrieval::resolve_ids(store, &args.ids, args.with_refs)?;
    for id in &missing {
        eprintln!("{} pearl not found: {}", "Warning:".yellow(), id);
    }

    let pushed = retrieval::push_retrieve(store, &args.paths, &args.scopes)?;
    let pearls = retrieval::union_dedup([by_id, pushed]);

    print!("{}", retrieval::render_context(store, &pearls, args.brief));
    Ok(())
}

pub fn run_clutch(args: ClutchArgs) -> Result<()> {
    let catalog = open_catalog()?;
    let pearls = retrieval::required_bundle(&catalog.store)?;

    if args.json {
        return print_json(&PearlList {
            pearls: &pearls,
            count: pearls.len(),
        });
    }

    print!(
        "{}",
        retrieval::render_context(&catalog.store, &pearls, args.brief)
    );
    Ok(())
}
