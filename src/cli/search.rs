//! `pl search` command
//!
//! Keyword search (substring over ID, name, namespace, description, tags) or,
//! with `--semantic`, nearest neighbours in the vector index.
//!
//! # Usage
//! ```bash
//! pl search users
//! pl search users --type table --limit 10
//! pl search "where are payments stored" --semantic
//! ```

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::utils::{open_catalog, pearl_table, print_json, truncate};
use crate::core::index::DEFAULT_SEARCH_LIMIT;
use crate::core::pearl::{Pearl, PearlType, Status};
use crate::core::store::Store;
use crate::core::vector::similarity;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Filter by type
    #[arg(short = 't', long = "type")]
    pub pearl_type: Option<String>,

    /// Filter by status
    #[arg(short, long)]
    pub status: Option<String>,

    /// Filter by tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Maximum results
    #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub limit: usize,

    /// Semantic (vector) search
    #[arg(long)]
    pub semantic: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Post-filters applied to search hits
struct Filters {
    pearl_type: Option<PearlType>,
    status: Option<Status>,
    tag: Option<String>,
}

impl Filters {
    fn from_args(args: &SearchArgs) -> Result<Self> {
        Ok(Self {
            pearl_type: args.pearl_type.as_deref().map(PearlType::new).transpose()?,
            status: args.status.as_deref().map(str::parse::<Status>).transpose()?,
            tag: args.tag.clone(),
        })
    }

    fn matches(&self, p: &Pearl) -> bool {
        self.pearl_type.as_ref().map_or(true, |t| &p.pearl_type == t)
            && self.status.map_or(true, |s| p.status == s)
            && self.tag.as_ref().map_or(true, |t| p.tags.contains(t))
    }
}

#[derive(Serialize)]
struct SemanticHit {
    pearl: Pearl,
    similarity: f32,
}

#[derive(Serialize)]
struct SearchOutput<'a, T: Serialize> {
    query: &'a str,
    semantic: bool,
    results: &'a [T],
    count: usize,
}

#[derive(Tabled)]
struct ScoreRow {
    #[tabled(rename = "SCORE")]
    score: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "TYPE")]
    pearl_type: String,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
}

pub fn run(args: SearchArgs) -> Result<()> {
    let catalog = open_catalog()?;
    let filters = Filters::from_args(&args)?;

    if args.semantic {
        if !catalog.store.has_embedder() {
            bail!(
                "Semantic search requires vector search to be enabled.\n\
                 Set `vector_search.enabled = true` in config.toml, then run 'pl index --rebuild'."
            );
        }
        return run_semantic(&catalog.store, &args, &filters);
    }

    let results: Vec<Pearl> = catalog
        .store
        .search(&args.query, args.limit)?
        .into_iter()
        .filter(|p| filters.matches(p))
        .collect();

    if args.json {
        return print_json(&SearchOutput {
            query: &args.query,
            semantic: false,
            results: &results,
            count: results.len(),
        });
    }

    if results.is_empty() {
        println!("No results for {:?}", args.query);
        return Ok(());
    }

    println!("{}", pearl_table(&results));
    println!("\n{} result(s) for {:?}", results.len(), args.query);
    Ok(())
}

fn run_semantic(store: &Store, args: &SearchArgs, filters: &Filters) -> Result<()> {
    let k = if args.limit == 0 {
        DEFAULT_SEARCH_LIMIT
    } else {
        args.limit
    };

    let hits: Vec<SemanticHit> = store
        .search_semantic(&args.query, k)?
        .into_iter()
        .filter(|(p, _)| filters.matches(p))
        .map(|(pearl, distance)| SemanticHit {
            pearl,
            similarity: similarity(distance),
        })
        .collect();

    if args.json {
        return print_json(&SearchOutput {
            query: &args.query,
            semantic: true,
            results: &hits,
            count: hits.len(),
        });
    }

    if hits.is_empty() {
        println!("No semantic results for {:?}", args.query);
        return Ok(());
    }

    let rows: Vec<ScoreRow> = hits
        .iter()
        .map(|h| ScoreRow {
            score: format!("{:.2}", h.similarity),
            id: h.pearl.id.clone(),
            pearl_type: h.pearl.pearl_type.to_string(),
            description: truncate(&h.pearl.description, 45),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::blank());
    println!("{}", table);

    println!("\n{} semantic result(s) for {:?}", hits.len(), args.query);
    Ok(())
}
