//! `pl prime` command
//!
//! Session-start summary for agents. Output adapts to catalog size; a
//! `.pearls/PRIME.md` file replaces it entirely. Outside a catalog the
//! command prints nothing and succeeds, so it is safe in global hooks.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::utils::open_catalog;
use crate::core::retrieval::{scope_summary, type_summary};
use crate::core::store::Store;

/// Catalogs above this size also get a scope list and a search hint
const SMALL_CATALOG: usize = 20;

#[derive(Args, Debug)]
pub struct PrimeArgs {}

const TRIGGERS: &str = "## When to save a pearl

- You explained a table, API or data flow that took effort to work out
- A convention was agreed (naming, error handling, testing style)
- A design discussion or brainstorm reached a decision
- You wrote steps someone will need again (deploys, migrations, incidents)
";

const REFERENCE: &str = "## Commands

- `pl context --for <path>` / `pl context --scope <scope>`: context for what you are touching
- `pl search \"<query>\"`: keyword search (`--semantic` for natural language)
- `pl clutch`: required project context
- `pl create <id> --type <type> --content \"...\"`: save knowledge
- `pl update <id> --globs \"src/**\" --scopes <scope>`: attach push triggers
";

pub fn run(_args: PrimeArgs) -> Result<()> {
    let catalog = match open_catalog() {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "not in a pearls catalog, nothing to prime");
            return Ok(());
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_prime(&mut out, &catalog.store, Some(&catalog.paths.prime))
}

fn write_prime(w: &mut impl Write, store: &Store, override_path: Option<&Path>) -> Result<()> {
    if let Some(path) = override_path {
        if let Ok(text) = std::fs::read_to_string(path) {
            w.write_all(text.as_bytes())?;
            return Ok(());
        }
    }

    let pearls = store.index().all()?;
    let count = pearls.len();

    write!(w, "# Pearls Context\n\n")?;

    if count == 0 {
        write!(
            w,
            "Pearls is installed but the catalog is empty. As you work, save reusable knowledge with `pl create`.\n\n"
        )?;
    } else {
        writeln!(w, "Your catalog has {} pearls: {}", count, type_summary(&pearls))?;

        if count <= SMALL_CATALOG {
            write!(
                w,
                "\nBefore working on unfamiliar code, check for existing knowledge with `pl context --for <path>`.\n\n"
            )?;
        } else {
            let scopes = scope_summary(&pearls);
            if !scopes.is_empty() {
                write!(w, "\nScopes: {}\n", scopes.join(", "))?;
            }
            write!(
                w,
                "\nSearch before starting work: `pl search \"<query>\" --semantic` or `pl context --for <path>`.\n\n"
            )?;
        }
    }

    write!(w, "{}\n{}", TRIGGERS, REFERENCE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pearl::{Pearl, PearlType};
    use tempfile::{tempdir, TempDir};

    fn store(dir: &TempDir) -> Result<Store> {
        let root = dir.path();
        Ok(Store::open(
            &root.join("pearls.db"),
            &root.join("pearls.jsonl"),
            &root.join("content"),
        )?)
    }

    fn add(store: &Store, id: &str, ty: &str, scopes: &[&str]) -> Result<()> {
        let p = Pearl::new(id, PearlType::new(ty)?)?
            .with_scopes(scopes.iter().map(|s| s.to_string()).collect());
        store.create(p, "# body\n")?;
        Ok(())
    }

    fn render(store: &Store, override_path: Option<&Path>) -> Result<String> {
        let mut buf = Vec::new();
        write_prime(&mut buf, store, override_path)?;
        Ok(String::from_utf8(buf)?)
    }

    #[test]
    fn test_empty_catalog() -> Result<()> {
        let dir = tempdir()?;
        let out = render(&store(&dir)?, None)?;
        assert!(out.contains("pl create"));
        assert!(out.contains("convention"));
        assert!(!out.contains("Your catalog"));
        Ok(())
    }

    #[test]
    fn test_small_catalog() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        add(&store, "db.users", "table", &[])?;
        add(&store, "db.orders", "table", &[])?;
        add(&store, "api.stripe", "api", &["payments"])?;

        let out = render(&store, None)?;
        assert!(out.contains("Your catalog has 3 pearls: 2 table, 1 api"));
        assert!(out.contains("pl context --for <path>"));
        assert!(!out.contains("Scopes:"));
        Ok(())
    }

    #[test]
    fn test_large_catalog_lists_scopes() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        for i in 0..(SMALL_CATALOG + 1) {
            let scope = if i % 2 == 0 { "backend" } else { "payments" };
            add(&store, &format!("db.t{}", i), "table", &[scope])?;
        }

        let out = render(&store, None)?;
        assert!(out.contains("Your catalog has 21 pearls: 21 table"));
        assert!(out.contains("Scopes: backend, payments"));
        Ok(())
    }

    #[test]
    fn test_override_file() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        add(&store, "db.users", "table", &[])?;

        let prime = dir.path().join("PRIME.md");
        std::fs::write(&prime, "custom instructions\n")?;
        assert_eq!(render(&store, Some(&prime))?, "custom instructions\n");

        let missing = dir.path().join("missing.md");
        assert!(render(&store, Some(&missing))?.starts_with("# Pearls Context"));
        Ok(())
    }
}
