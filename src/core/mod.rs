//! Core module - Catalog storage and retrieval
//!
//! Leaf stores (`content`, `log`, `index` + `vector`) are sequenced by
//! [`store::Store`]; everything above it only talks to the store.

pub mod content;
pub mod doctor;
pub mod embedding;
pub mod error;
pub mod index;
pub mod introspect;
pub mod log;
pub mod namespace;
pub mod pearl;
pub mod retrieval;
pub mod store;
pub mod vector;
