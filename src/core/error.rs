//! Error - Typed failures for the storage layers
//!
//! Leaf stores return these unchanged; the [`Store`](super::store::Store)
//! wraps them with the record ID and phase via [`Error::context`].

use std::path::PathBuf;

use thiserror::Error;

use super::embedding::EmbedError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Record, content file, or config path absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Create with a colliding ID
    #[error("pearl already exists: {0}")]
    AlreadyExists(String),

    /// Malformed ID, type, glob, scope, status or vector
    #[error("invalid {0}")]
    Validation(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A line of the durable log that does not parse
    #[error("parse line {line} of {}: {source}", path.display())]
    LogParse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Embed(#[from] EmbedError),

    /// Operation context added by the orchestrator
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Wrap with operation context (e.g. `"insert pearl db.users"`)
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context layers
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self.root(), Error::AlreadyExists(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.root(), Error::Validation(_))
    }
}

/// Attach context to a `Result` in one call
pub(crate) trait ResultExt<T> {
    fn with_context(self, f: impl FnOnce() -> String) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, f: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|e| e.context(f()))
    }
}
