//! `pl show` and `pl cat` commands
//!
//! # Usage
//! ```bash
//! pl show db.postgres.users
//! pl show db.postgres.orders --with-refs
//! pl show db.postgres.users --json
//! pl cat db.postgres.users
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::utils::{open_catalog, print_json};
use crate::core::pearl::Pearl;
use crate::core::store::Store;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Pearl ID
    pub id: String,

    /// Include referenced pearls
    #[arg(long)]
    pub with_refs: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CatArgs {
    /// Pearl ID
    pub id: String,
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    pearl: &'a Pearl,
    #[serde(skip_serializing_if = "Option::is_none")]
    references: Option<Vec<Pearl>>,
}

pub fn run(args: ShowArgs) -> Result<()> {
    let catalog = open_catalog()?;
    let store = &catalog.store;
    let pearl = store.require(&args.id)?;

    if args.json {
        let references = if args.with_refs && !pearl.references.is_empty() {
            Some(resolve_refs(store, &pearl)?)
        } else {
            None
        };
        return print_json(&ShowOutput {
            pearl: &pearl,
            references,
        });
    }

    print_pretty(store, &pearl, args.with_refs)
}

fn resolve_refs(store: &Store, pearl: &Pearl) -> Result<Vec<Pearl>> {
    let mut refs = Vec::new();
    for id in &pearl.references {
        if let Some(p) = store.get(id)? {
            refs.push(p);
        }
    }
    Ok(refs)
}

fn print_pretty(store: &Store, p: &Pearl, with_refs: bool) -> Result<()> {
    println!("{} {}", "●".cyan(), p.id.bold());
    println!("  Name:        {}", p.name);
    if !p.namespace.is_empty() {
        println!("  Namespace:   {}", p.namespace);
    }
    println!("  Type:        {}", p.pearl_type);
    println!("  Status:      {}", p.status);

    if !p.description.is_empty() {
        println!("  Description: {}", p.description);
    }
    if !p.tags.is_empty() {
        println!("  Tags:        {}", p.tags.join(", "));
    }
    if !p.globs.is_empty() {
        println!("  Globs:       {}", p.globs.join(", "));
    }
    if !p.scopes.is_empty() {
        println!("  Scopes:      {}", p.scopes.join(", "));
    }
    if p.required {
        println!("  Required:    yes (priority {})", p.priority);
    }
    if !p.content_path.is_empty() {
        println!("  Content:     {}", p.content_path);
    }

    if let Some(conn) = &p.connection {
        println!("  Connection:");
        println!("    Type:      {}", conn.kind);
        if !conn.host.is_empty() {
            println!("    Host:      {}", conn.host);
        }
        if let Some(port) = conn.port {
            println!("    Port:      {}", port);
        }
        if !conn.database.is_empty() {
            println!("    Database:  {}", conn.database);
        }
    }

    if !p.references.is_empty() {
        println!("  References:");
        for r in &p.references {
            println!("    → {}", r);
        }

        if with_refs {
            println!("\n  Referenced Pearls:");
            for id in &p.references {
                match store.get(id)? {
                    Some(r) => println!("    ● {} [{}] {}", r.id, r.pearl_type, r.description),
                    None => println!("    {} {}", id, "(not found)".dimmed()),
                }
            }
        }
    }

    if let Some(parent) = &p.parent {
        println!("  Parent:      {}", parent);
    }

    println!(
        "  Created:     {} by {}",
        p.created_at.format("%Y-%m-%d %H:%M"),
        p.created_by
    );
    println!("  Updated:     {}", p.updated_at.format("%Y-%m-%d %H:%M"));
    Ok(())
}

pub fn run_cat(args: CatArgs) -> Result<()> {
    let catalog = open_catalog()?;
    let pearl = catalog.store.require(&args.id)?;
    let body = catalog.store.get_content(&pearl)?;
    print!("{}", body);
    Ok(())
}
