//! CLI utility functions
//!
//! Common helpers shared across commands:
//! - Catalog discovery and store opening (`open_catalog`)
//! - Inline / stdin content arguments (`read_content_arg`)
//! - JSON and table output

use std::io::Read;

use anyhow::{Context, Result};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::{self, Config, Paths};
use crate::core::embedding::HashingEmbedder;
use crate::core::pearl::Pearl;
use crate::core::store::Store;

/// An opened catalog: where it lives, how it is configured, and its store
pub struct Catalog {
    pub paths: Paths,
    pub config: Config,
    pub store: Store,
}

/// Find the catalog from the working directory and open it.
///
/// A missing config file falls back to defaults; an invalid one is an error.
pub fn open_catalog() -> Result<Catalog> {
    let paths = config::discover()?;
    let config = load_config(&paths)?;
    let store = open_store(&paths, &config)?;
    Ok(Catalog {
        paths: paths.with_content_dir(&config.storage.content_dir),
        config,
        store,
    })
}

pub fn load_config(paths: &Paths) -> Result<Config> {
    if paths.config.exists() {
        Config::load(&paths.config)
    } else {
        Ok(Config::default())
    }
}

/// Open the store for `paths`, attaching the built-in embedder when
/// vector search is enabled
pub fn open_store(paths: &Paths, config: &Config) -> Result<Store> {
    let paths = paths.clone().with_content_dir(&config.storage.content_dir);
    let mut store = Store::open(&paths.db, &paths.log, &paths.content)
        .with_context(|| format!("Failed to open catalog at {}", paths.root.display()))?;

    if config.vector_search.enabled {
        store.set_embedder(Box::new(HashingEmbedder::new(config.vector_search.dimension)));
    }
    Ok(store)
}

/// `--content` value: `-` reads stdin, anything else has `\n` / `\t`
/// escapes expanded so single-line arguments can carry markdown
pub fn read_content_arg(value: Option<&str>) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read content from stdin")?;
            Ok(Some(buf))
        }
        Some(s) => Ok(Some(expand_escapes(s))),
    }
}

pub fn expand_escapes(s: &str) -> String {
    s.replace("\\n", "\n").replace("\\t", "\t")
}

/// Pretty-print any serializable value to stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Tabled)]
struct PearlRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "TYPE")]
    pearl_type: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
}

impl From<&Pearl> for PearlRow {
    fn from(p: &Pearl) -> Self {
        Self {
            id: p.id.clone(),
            pearl_type: p.pearl_type.to_string(),
            status: p.status.to_string(),
            description: truncate(&p.description, 50),
        }
    }
}

/// ID / type / status / description table
pub fn pearl_table(pearls: &[Pearl]) -> String {
    let rows: Vec<PearlRow> = pearls.iter().map(PearlRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::blank());
    table.to_string()
}

/// Shorten `s` to at most `max` characters, ending in "..."
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_escapes() {
        assert_eq!(expand_escapes("# Title\\n\\nBody\\tx"), "# Title\n\nBody\tx");
        assert_eq!(expand_escapes("plain"), "plain");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long description here", 10), "a long ...");
        assert_eq!(truncate("ünïcödé strings", 8), "ünïcö...");
    }

    #[test]
    fn test_inline_content_arg() -> Result<()> {
        assert_eq!(read_content_arg(None)?, None);
        assert_eq!(read_content_arg(Some("a\\nb"))?, Some("a\nb".to_string()));
        Ok(())
    }
}
