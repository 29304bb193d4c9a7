//! `pl create` command
//!
//! # Usage
//! ```bash
//! pl create db.postgres.users --type table -d "User accounts" --tag pii
//! pl create conventions.errors --type convention --globs "src/**/*.rs" --scopes error-handling
//! pl create notes.design --type brainstorm --content "# Design\n\nKey decisions..."
//! echo "# Runbook" | pl create ops.deploy --type runbook --content -
//! ```
//!
//! Without `--content` the body starts from a type-specific template.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_catalog, print_json, read_content_arg};
use crate::core::content::ContentStore;
use crate::core::pearl::{split_list, Pearl, PearlType, Status};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Pearl ID (dot-separated namespace path, e.g. db.postgres.users)
    pub id: String,

    /// Pearl type (table, api, convention, runbook, ...)
    #[arg(short = 't', long = "type", default_value = "table")]
    pub pearl_type: String,

    /// Brief description
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Tags (can be repeated)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Comma-separated file globs for push retrieval
    #[arg(long)]
    pub globs: Option<String>,

    /// Comma-separated scopes for push retrieval
    #[arg(long)]
    pub scopes: Option<String>,

    /// Comma-separated IDs this pearl references
    #[arg(long)]
    pub refs: Option<String>,

    /// Include in the required context bundle
    #[arg(long)]
    pub required: bool,

    /// Priority (higher first)
    #[arg(long, default_value_t = 0)]
    pub priority: i64,

    /// Inline content ("-" reads stdin)
    #[arg(long)]
    pub content: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CreateArgs) -> Result<()> {
    let catalog = open_catalog()?;

    let mut pearl = Pearl::new(&args.id, PearlType::new(args.pearl_type.as_str())?)?
        .with_description(args.description)
        .with_tags(args.tags)
        .with_created_by(catalog.config.created_by());

    pearl.status = catalog.config.defaults.status.parse::<Status>()?;
    pearl.globs = args.globs.as_deref().map(split_list).unwrap_or_default();
    pearl.scopes = args.scopes.as_deref().map(split_list).unwrap_or_default();
    pearl.references = args.refs.as_deref().map(split_list).unwrap_or_default();
    pearl.required = args.required;
    pearl.priority = args.priority;

    let body = match read_content_arg(args.content.as_deref())? {
        Some(body) => body,
        None => ContentStore::template(&pearl),
    };

    let pearl = catalog.store.create(pearl, &body)?;

    if args.json {
        return print_json(&pearl);
    }

    println!("{} Created pearl: {}", "✓".green(), pearl.id.bold());
    println!("  Content: {}", pearl.content_path);
    Ok(())
}
