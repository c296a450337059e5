//! Vector search and graph expansion capabilities, plus their SQLite adapters.
//!
//! The engine depends only on the [`VectorSearch`] and [`GraphExpand`] traits. The
//! [`vector::SqliteVectorSearch`] and [`graph::SqliteGraph`] adapters read the
//! knowledge database described in [`crate::db::schema`] through a shared
//! connection.

pub mod graph;
pub mod vector;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use rusqlite::Connection;

use crate::retrieval::types::{Expansion, ScoredEntity};

/// Connection shared by the SQLite adapters.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// K-nearest-neighbor search over entity embeddings.
///
/// Implementations are synchronous; the engine calls them through
/// `tokio::task::spawn_blocking`.
pub trait VectorSearch: Send + Sync {
    /// Return at most `k` entities, closest first. Fewer when the index is smaller.
    fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredEntity>>;
}

/// First-degree graph expansion.
///
/// Every requested id must be present in the result; ids without relationships map
/// to an empty [`Expansion`]. Expansion never goes beyond direct neighbors.
pub trait GraphExpand: Send + Sync {
    fn expand(&self, ids: &[String]) -> Result<HashMap<String, Expansion>>;
}

pub(crate) fn lock(conn: &SharedConnection) -> Result<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))
}
