//! Query embedding.
//!
//! Provides the [`EmbeddingProvider`] trait, a local ONNX implementation of
//! all-MiniLM-L6-v2 (384 dimensions, L2-normalized, the same model the vector index
//! was built with) and the injected query [`cache`].

pub mod cache;
pub mod local;

use std::sync::Arc;

use anyhow::Result;

use crate::config::{expand_tilde, EmbeddingConfig};
use cache::{EmbeddingCache, FileEmbeddingCache, InMemoryEmbeddingCache};

/// Number of dimensions in the embedding vectors (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into vectors.
///
/// Implementations are synchronous; the engine calls them through
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// Only `"local"` is supported. Fails if the model files are missing; run
/// `itinera model download` first.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => Ok(Arc::new(local::LocalEmbeddingProvider::new(config)?)),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// Create the query embedding cache selected by `embedding.query_cache`
/// (`"off"`, `"memory"` or `"file"`).
pub fn create_cache(config: &EmbeddingConfig) -> Result<Option<Arc<dyn EmbeddingCache>>> {
    match config.query_cache.as_str() {
        "off" => Ok(None),
        "memory" => Ok(Some(Arc::new(InMemoryEmbeddingCache::new()))),
        "file" => {
            let path = expand_tilde(&config.query_cache_path);
            Ok(Some(Arc::new(FileEmbeddingCache::open(path)?)))
        }
        other => anyhow::bail!("unknown query cache: {other}. Supported: off, memory, file"),
    }
}
