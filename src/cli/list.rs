//! `pl list` command
//!
//! # Usage
//! ```bash
//! pl list
//! pl list --namespace db.postgres --type table
//! pl list --scope payments --json
//! pl list --required
//! ```

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::utils::{open_catalog, pearl_table, print_json};
use crate::core::index::ListFilter;
use crate::core::pearl::{Pearl, PearlType, Status};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Namespace prefix
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Pearl type
    #[arg(short = 't', long = "type")]
    pub pearl_type: Option<String>,

    /// Status (active, deprecated, archived)
    #[arg(short, long)]
    pub status: Option<String>,

    /// Tag (exact)
    #[arg(long)]
    pub tag: Option<String>,

    /// Scope (exact)
    #[arg(long)]
    pub scope: Option<String>,

    /// Only required pearls
    #[arg(long)]
    pub required: bool,

    /// Maximum number of results
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
pub(crate) struct PearlList<'a> {
    pub pearls: &'a [Pearl],
    pub count: usize,
}

pub fn run(args: ListArgs) -> Result<()> {
    let catalog = open_catalog()?;

    let filter = ListFilter {
        namespace: args.namespace,
        pearl_type: args.pearl_type.map(PearlType::new).transpose()?,
        status: args.status.as_deref().map(str::parse::<Status>).transpose()?,
        tag: args.tag,
        scope: args.scope,
        required: args.required.then_some(true),
        limit: args.limit,
    };

    let pearls = catalog.store.list(&filter)?;

    if args.json {
        return print_json(&PearlList {
            pearls: &pearls,
            count: pearls.len(),
        });
    }

    if pearls.is_empty() {
        println!("No pearls found.");
        return Ok(());
    }

    println!("{}", pearl_table(&pearls));
    println!("\n{} pearl(s)", pearls.len());
    Ok(())
}
