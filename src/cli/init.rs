//! `pl init` command
//!
//! Creates the `.pearls/` catalog directory.
//!
//! # Usage
//! ```bash
//! pl init                     # Initialize in current directory
//! pl init /path/to/project    # Initialize in specific path
//! pl init --name warehouse -q # Named project, no output (for agents)
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, Paths, GITIGNORE_FILE};
use crate::core::store::Store;

const CATALOG_GITIGNORE: &str = "# Pearls - SQLite database (local cache, rebuilt from jsonl)\n\
pearls.db\n\
pearls.db-shm\n\
pearls.db-wal\n";

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to initialize (default: current directory)
    pub path: Option<PathBuf>,

    /// Project name (default: directory name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Suppress output
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let base_path = args.path.unwrap_or_else(|| PathBuf::from("."));
    let paths = Paths::for_project(&base_path);

    if paths.root.exists() {
        if !args.quiet {
            println!("Already initialized in {}", paths.root.display());
        }
        return Ok(());
    }

    // 1. Directory structure
    fs::create_dir_all(&paths.content)
        .with_context(|| format!("Failed to create {}", paths.content.display()))?;

    // 2. Config
    let mut config = Config::default();
    config.project.name = match args.name {
        Some(name) => name,
        None => project_name(&base_path)?,
    };
    config.save_to(&paths.config)?;

    // 3. Database + empty log
    Store::open(&paths.db, &paths.log, &paths.content)?;
    fs::write(&paths.log, "")
        .with_context(|| format!("Failed to create {}", paths.log.display()))?;

    // 4. Ignore rules
    fs::write(paths.root.join(GITIGNORE_FILE), CATALOG_GITIGNORE)?;
    ensure_ignored(&base_path.join(GITIGNORE_FILE), ".env")?;

    if !args.quiet {
        println!("{} Initialized pearls in {}", "✓".green(), paths.root.display());
        println!("  {} Created config.toml", "✓".green());
        println!("  {} Created pearls.db", "✓".green());
        println!("  {} Created pearls.jsonl", "✓".green());
        println!("  {} Created content/", "✓".green());
        println!("\nNext steps:");
        println!("  pl create db.users --type table --description \"User accounts\"");
        println!("  pl list");
        println!("  pl onboard");
    }

    Ok(())
}

fn project_name(base: &Path) -> Result<String> {
    let abs = base
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", base.display()))?;
    Ok(abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pearls".to_string()))
}

/// Append `entry` to a gitignore unless a line already matches it
fn ensure_ignored(gitignore: &Path, entry: &str) -> Result<()> {
    let existing = match fs::read_to_string(gitignore) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", gitignore.display())),
    };

    if existing.lines().any(|l| l.trim() == entry) {
        return Ok(());
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(entry);
    updated.push('\n');

    fs::write(gitignore, updated)
        .with_context(|| format!("Failed to update {}", gitignore.display()))
}
