//! Log - Durable JSONL record log
//!
//! One full pearl snapshot per line. This file is the source of truth:
//! the index database and vectors are rebuildable from it.
//!
//! # Key Points
//! - `write_all` is a full atomic replace (temp file + fsync + rename)
//! - `append` is only valid for brand-new pearls; updates and deletes
//!   always go through `write_all` so each ID has one line

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::error::{Error, Result};
use super::pearl::Pearl;

/// JSONL log handle
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read every pearl; a missing file is zero pearls.
    /// Blank lines are skipped, malformed lines fail with their line number.
    pub fn read_all(&self) -> Result<Vec<Pearl>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(format!("open log {}", self.path.display()), e)),
        };

        let mut pearls = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::io(format!("read log {}", self.path.display()), e))?;
            if line.trim().is_empty() {
                continue;
            }
            let pearl: Pearl = serde_json::from_str(&line).map_err(|source| Error::LogParse {
                path: self.path.clone(),
                line: idx + 1,
                source,
            })?;
            pearls.push(pearl);
        }

        Ok(pearls)
    }

    /// Replace the whole log atomically. On failure the temp file is
    /// removed and the previous log is left untouched.
    pub fn write_all(&self, pearls: &[Pearl]) -> Result<()> {
        let dir = self.dir();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::io(format!("create log directory {}", dir.display()), e))?;

        // Dropping the NamedTempFile on any early return deletes it
        let tmp = NamedTempFile::new_in(&dir)
            .map_err(|e| Error::io(format!("create temp file in {}", dir.display()), e))?;

        {
            let mut writer = BufWriter::new(tmp.as_file());
            for pearl in pearls {
                serde_json::to_writer(&mut writer, pearl)
                    .map_err(|e| Error::from(e).context(format!("encode pearl {}", pearl.id)))?;
                writer
                    .write_all(b"\n")
                    .map_err(|e| Error::io("write temp log", e))?;
            }
            writer.flush().map_err(|e| Error::io("flush temp log", e))?;
        }

        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::io("sync temp log", e))?;

        tmp.persist(&self.path).map_err(|e| {
            Error::io(format!("rename temp log over {}", self.path.display()), e.error)
        })?;

        tracing::debug!(path = %self.path.display(), count = pearls.len(), "rewrote log");
        Ok(())
    }

    /// Append one new pearl
    pub fn append(&self, pearl: &Pearl) -> Result<()> {
        let dir = self.dir();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::io(format!("create log directory {}", dir.display()), e))?;

        let mut line = serde_json::to_string(pearl)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(format!("open log {} for append", self.path.display()), e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| Error::io(format!("append to log {}", self.path.display()), e))?;

        tracing::debug!(id = %pearl.id, "appended to log");
        Ok(())
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}
