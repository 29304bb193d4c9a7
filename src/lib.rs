//! pearls - Data catalog and context store for AI agents
//!
//! Pearls describe data assets and project knowledge. Each one is metadata
//! plus an optional markdown body, kept in three layers under `.pearls/`:
//!
//! - **Log** (`pearls.jsonl`): durable, git-tracked source of truth
//! - **Index** (`pearls.db`): SQLite cache for queries and vector search,
//!   rebuildable from the log at any time
//! - **Content** (`content/`): one markdown file per pearl
//!
//! ## Key Concepts
//!
//! - **Namespaced IDs**: `db.postgres.users`
//! - **Push retrieval**: globs and scopes pick pearls for the file or topic
//!   an agent is working on
//! - **Pull retrieval**: keyword and semantic search

pub mod cli;
pub mod config;
pub mod core;

pub use crate::core::error::{Error, Result};
pub use crate::core::pearl::{Pearl, PearlType, Status};
pub use crate::core::store::Store;
