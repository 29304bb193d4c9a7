//! Content - Markdown bodies on disk
//!
//! Maps a pearl's (namespace, name) to a relative `.md` path under the
//! content root: `db.postgres` + `users` → `db/postgres/users.md`.
//! Stateless apart from the root directory.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::error::{Error, Result};
use super::pearl::{Pearl, PearlType};

const CONTENT_EXT: &str = "md";

/// Content file manager
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative content path for a pearl, always `/`-separated
    pub fn path_for(namespace: &str, name: &str) -> String {
        let file = format!("{}.{}", name, CONTENT_EXT);
        if namespace.is_empty() {
            return file;
        }
        format!("{}/{}", namespace.replace('.', "/"), file)
    }

    pub fn full_path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        fs::read_to_string(self.full_path(rel))
            .map_err(|e| not_found_or_io(rel, "read content file", e))
    }

    /// Full overwrite; parent directories are created as needed
    pub fn write(&self, rel: &str, content: &str) -> Result<()> {
        let full = self.full_path(rel);
        if let Some(dir) = full.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| Error::io(format!("create content directory {}", dir.display()), e))?;
        }
        fs::write(&full, content)
            .map_err(|e| Error::io(format!("write content file {}", rel), e))?;
        tracing::debug!(path = rel, bytes = content.len(), "wrote content file");
        Ok(())
    }

    /// Idempotent: a missing file is not an error
    pub fn delete(&self, rel: &str) -> Result<()> {
        match fs::remove_file(self.full_path(rel)) {
            Ok(()) => {
                tracing::debug!(path = rel, "deleted content file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(format!("delete content file {}", rel), e)),
        }
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.full_path(rel).is_file()
    }

    pub fn hash(&self, rel: &str) -> Result<String> {
        let data = fs::read(self.full_path(rel))
            .map_err(|e| not_found_or_io(rel, "read file for hash", e))?;
        Ok(hash_bytes(&data))
    }

    /// Every `.md` file below the root, as `/`-separated relative paths.
    /// A missing root yields an empty set.
    pub fn list_all_files(&self) -> Result<BTreeSet<String>> {
        let mut files = BTreeSet::new();
        if !self.root.exists() {
            return Ok(files);
        }

        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| {
                let context = format!("walk content directory {}", self.root.display());
                match e.into_io_error() {
                    Some(io) => Error::io(context, io),
                    None => Error::io(context, std::io::Error::other("filesystem loop")),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CONTENT_EXT) {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(&self.root) {
                let rel: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.insert(rel.join("/"));
            }
        }

        Ok(files)
    }

    /// Default markdown skeleton for a new pearl
    pub fn template(pearl: &Pearl) -> String {
        let mut out = format!("# {}\n\n", pearl.name);

        if !pearl.description.is_empty() {
            out.push_str(&pearl.description);
            out.push_str("\n\n");
        }

        match pearl.pearl_type.as_str() {
            PearlType::TABLE => {
                out.push_str("## Schema\n\n");
                out.push_str("| Column | Type | Nullable | Description |\n");
                out.push_str("|--------|------|----------|-------------|\n");
                out.push_str("| id | | | |\n\n");
                out.push_str("## Relationships\n\n");
                out.push_str("## Access Patterns\n\n");
                out.push_str("```sql\n-- Example query\n```\n\n");
                out.push_str("## Notes\n\n");
            }
            PearlType::API | PearlType::ENDPOINT => {
                out.push_str("## Endpoints\n\n");
                out.push_str("## Authentication\n\n");
                out.push_str("## Examples\n\n");
                out.push_str("```bash\n# Example request\n```\n\n");
                out.push_str("## Notes\n\n");
            }
            PearlType::DATABASE | PearlType::SCHEMA => {
                out.push_str("## Overview\n\n");
                out.push_str("## Tables\n\n");
                out.push_str("## Access\n\n");
                out.push_str("## Notes\n\n");
            }
            _ => {
                out.push_str("## Overview\n\n");
                out.push_str("## Details\n\n");
                out.push_str("## Notes\n\n");
            }
        }

        out
    }
}

/// Hex SHA-256
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn hash_str(content: &str) -> String {
    hash_bytes(content.as_bytes())
}

fn not_found_or_io(rel: &str, context: &str, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::NotFound(format!("content file {}", rel))
    } else {
        Error::io(format!("{} {}", context, rel), e)
    }
}
