//! Configuration module
//!
//! A catalog lives in a `.pearls/` directory at the project root:
//!
//! ```text
//! .pearls/
//!   config.toml    settings (this module)
//!   pearls.jsonl   durable log, git-tracked
//!   pearls.db      index cache, gitignored
//!   content/       markdown bodies
//!   PRIME.md       optional `pl prime` override
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::embedding::DEFAULT_DIMENSION;

pub const DIR_NAME: &str = ".pearls";
pub const CONFIG_FILE: &str = "config.toml";
pub const DB_FILE: &str = "pearls.db";
pub const LOG_FILE: &str = "pearls.jsonl";
pub const CONTENT_DIR: &str = "content";
pub const PRIME_FILE: &str = "PRIME.md";
pub const GITIGNORE_FILE: &str = ".gitignore";

/// Overrides root discovery; points at a `.pearls` directory
pub const DIR_ENV: &str = "PEARLS_DIR";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub vector_search: VectorSearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_project_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            description: "Data asset catalog".to_string(),
        }
    }
}

fn default_project_name() -> String {
    "my-data-catalog".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Relative to the `.pearls` directory
    #[serde(default = "default_content_dir")]
    pub content_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
        }
    }
}

fn default_content_dir() -> String {
    CONTENT_DIR.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_status")]
    pub status: String,

    /// `${USER}` expands from the environment
    #[serde(default = "default_created_by")]
    pub created_by: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            status: default_status(),
            created_by: default_created_by(),
        }
    }
}

fn default_status() -> String {
    "active".to_string()
}

fn default_created_by() -> String {
    "${USER}".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSearchConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dimension: default_dimension(),
        }
    }
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

impl Config {
    /// Load config from a specific file; fails on unreadable or invalid TOML
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(
            self.defaults.status.as_str(),
            "active" | "deprecated" | "archived"
        ) {
            bail!(
                "defaults.status must be active, deprecated, or archived (got {:?})",
                self.defaults.status
            );
        }
        if self.vector_search.dimension == 0 {
            bail!("vector_search.dimension must be greater than zero");
        }
        if self.storage.content_dir.trim().is_empty() {
            bail!("storage.content_dir cannot be empty");
        }
        Ok(())
    }

    /// Author for new pearls: configured value, then `$USER`, then "unknown"
    pub fn created_by(&self) -> String {
        let configured = self.defaults.created_by.trim();
        if !configured.is_empty() && configured != "${USER}" {
            return configured.to_string();
        }
        std::env::var("USER")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Resolved file locations for one catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// The `.pearls` directory
    pub root: PathBuf,
    pub config: PathBuf,
    pub db: PathBuf,
    pub log: PathBuf,
    pub content: PathBuf,
    pub prime: PathBuf,
}

impl Paths {
    /// Paths for a catalog directory (the `.pearls` dir itself)
    pub fn from_catalog_dir(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config: root.join(CONFIG_FILE),
            db: root.join(DB_FILE),
            log: root.join(LOG_FILE),
            content: root.join(CONTENT_DIR),
            prime: root.join(PRIME_FILE),
            root,
        }
    }

    /// Paths for a project directory containing `.pearls`
    pub fn for_project(project: &Path) -> Self {
        Self::from_catalog_dir(project.join(DIR_NAME))
    }

    /// Use the content directory named in config
    pub fn with_content_dir(mut self, content_dir: &str) -> Self {
        self.content = self.root.join(content_dir);
        self
    }
}

/// Find `.pearls` by walking up from `start`, similar to how git finds `.git`.
/// Returns the `.pearls` directory.
pub fn find_root(start: &Path) -> Result<PathBuf> {
    let mut current = start
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", start.display()))?;

    loop {
        let candidate = current.join(DIR_NAME);
        if candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            bail!("Not a pearls catalog (or any parent directory). Run 'pl init' first.");
        }
    }
}

/// Locate the catalog for this invocation: `PEARLS_DIR`, else walk up from cwd
pub fn discover() -> Result<Paths> {
    if let Ok(dir) = std::env::var(DIR_ENV) {
        if !dir.is_empty() {
            let root = PathBuf::from(dir);
            if !root.is_dir() {
                bail!("{} points at {}, which is not a directory", DIR_ENV, root.display());
            }
            return Ok(Paths::from_catalog_dir(root));
        }
    }

    let cwd = std::env::current_dir().context("Failed to get working directory")?;
    Ok(Paths::from_catalog_dir(find_root(&cwd)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);

        let config = Config::default();
        config.save_to(&path)?;
        let loaded = Config::load(&path)?;

        assert_eq!(loaded.project.name, "my-data-catalog");
        assert_eq!(loaded.storage.content_dir, "content");
        assert_eq!(loaded.defaults.status, "active");
        assert!(!loaded.vector_search.enabled);
        assert_eq!(loaded.vector_search.dimension, DEFAULT_DIMENSION);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[vector_search]\nenabled = true\n")?;

        let loaded = Config::load(&path)?;
        assert!(loaded.vector_search.enabled);
        assert_eq!(loaded.vector_search.dimension, DEFAULT_DIMENSION);
        assert_eq!(loaded.project.name, "my-data-catalog");
        Ok(())
    }

    #[test]
    fn test_invalid_toml_fails() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "project = [not valid")?;
        assert!(Config::load(&path).is_err());

        std::fs::write(&path, "[defaults]\nstatus = \"gone\"\n")?;
        assert!(Config::load(&path).is_err());

        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
        Ok(())
    }

    #[test]
    fn test_created_by_explicit() {
        let mut config = Config::default();
        config.defaults.created_by = "data-team".into();
        assert_eq!(config.created_by(), "data-team");
    }

    #[test]
    fn test_paths_layout() {
        let paths = Paths::for_project(Path::new("/work/repo"));
        assert_eq!(paths.root, PathBuf::from("/work/repo/.pearls"));
        assert_eq!(paths.db, PathBuf::from("/work/repo/.pearls/pearls.db"));
        assert_eq!(paths.log, PathBuf::from("/work/repo/.pearls/pearls.jsonl"));
        assert_eq!(paths.content, PathBuf::from("/work/repo/.pearls/content"));

        let custom = paths.with_content_dir("docs");
        assert_eq!(custom.content, PathBuf::from("/work/repo/.pearls/docs"));
    }

    #[test]
    fn test_find_root_walks_up() -> Result<()> {
        let dir = tempdir()?;
        std::fs::create_dir_all(dir.path().join(DIR_NAME))?;
        let nested = dir.path().join("src").join("models");
        std::fs::create_dir_all(&nested)?;

        let found = find_root(&nested)?;
        assert_eq!(found, dir.path().canonicalize()?.join(DIR_NAME));
        Ok(())
    }
}
