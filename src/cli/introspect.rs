//! `pl introspect` command
//!
//! Generate database, schema and table pearls from a live database.
//!
//! # Usage
//! ```bash
//! pl introspect --sqlite ./app.db --prefix db.app
//! pl introspect --prefix db.app --env APP_DB_PATH   # path from environment
//! pl introspect --sqlite ./app.db --prefix db.app --dry-run
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use super::utils::open_catalog;
use crate::core::introspect::{self, GeneratedPearl, Introspector, SqliteIntrospector};
use crate::core::store::Store;

#[derive(Args, Debug)]
pub struct IntrospectArgs {
    /// SQLite database file (default: path from --env variable)
    #[arg(long)]
    pub sqlite: Option<PathBuf>,

    /// Namespace prefix for generated pearls
    #[arg(long)]
    pub prefix: String,

    /// Environment variable recorded as the connection host
    #[arg(long = "env")]
    pub env_var: Option<String>,

    /// Limit to one schema
    #[arg(long)]
    pub schema: Option<String>,

    /// Print what would be created without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Leave pearls that already exist untouched
    #[arg(long)]
    pub skip_existing: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Outcome {
    created: usize,
    updated: usize,
    skipped: usize,
}

pub fn run(args: IntrospectArgs) -> Result<()> {
    let env_var = args
        .env_var
        .clone()
        .unwrap_or_else(|| introspect::default_env_var("sqlite").to_string());

    let db_path = match &args.sqlite {
        Some(p) => p.clone(),
        None => match std::env::var(&env_var) {
            Ok(p) if !p.is_empty() => PathBuf::from(p),
            _ => bail!("No database given: pass --sqlite <path> or set {}", env_var),
        },
    };

    println!("Connecting to sqlite {}...", db_path.display());
    let intro = SqliteIntrospector::open(&db_path)?;

    let tables = discover(&intro, args.schema.as_deref())?;
    let generated = introspect::generate_pearls(&args.prefix, "sqlite", &tables, &env_var)?;

    if args.dry_run {
        println!("\nDry run: would write {} pearl(s):", generated.len());
        for g in &generated {
            println!("  {} ({})", g.pearl.id, g.pearl.pearl_type);
        }
        return Ok(());
    }

    let catalog = open_catalog()?;
    let outcome = apply(&catalog.store, generated, args.skip_existing)?;

    print!(
        "\n{} Created {} pearl(s), updated {}",
        "✓".green(),
        outcome.created,
        outcome.updated
    );
    if outcome.skipped > 0 {
        print!(" ({} skipped)", outcome.skipped);
    }
    println!();
    Ok(())
}

fn discover(
    intro: &dyn Introspector,
    only: Option<&str>,
) -> Result<BTreeMap<String, Vec<introspect::Table>>> {
    let mut schemas = intro.schemas()?;
    if let Some(only) = only {
        if !schemas.iter().any(|s| s == only) {
            bail!("Schema {:?} not found (available: {:?})", only, schemas);
        }
        schemas = vec![only.to_string()];
    }
    println!("Found {} schema(s): {:?}", schemas.len(), schemas);

    let mut out = BTreeMap::new();
    for schema in schemas {
        let tables = intro
            .tables(&schema)
            .with_context(|| format!("Failed to read tables in {}", schema))?;
        println!("  {}: {} table(s)", schema, tables.len());
        out.insert(schema, tables);
    }
    Ok(out)
}

/// Create new pearls and refresh existing ones in place
fn apply(store: &Store, generated: Vec<GeneratedPearl>, skip_existing: bool) -> Result<Outcome> {
    let mut outcome = Outcome::default();

    for GeneratedPearl { mut pearl, content } in generated {
        let body = if content.is_empty() {
            format!("# {}\n", pearl.name)
        } else {
            content
        };

        match store.get(&pearl.id)? {
            Some(_) if skip_existing => outcome.skipped += 1,
            Some(existing) => {
                pearl.created_at = existing.created_at;
                pearl.created_by = existing.created_by;
                pearl.content_path = existing.content_path;
                store.update(pearl, Some(&body))?;
                outcome.updated += 1;
            }
            None => {
                store.create(pearl, &body)?;
                outcome.created += 1;
            }
        }
    }
    Ok(outcome)
}
