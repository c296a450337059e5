//! Query embedding caches.
//!
//! The engine receives an [`EmbeddingCache`] by injection. Entries are keyed by the
//! exact query text, never evicted, and population is last-writer-wins. Putting an
//! entry that is already cached is a no-op.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use anyhow::{Context, Result};

/// Key-value store from exact query text to embedding vector.
pub trait EmbeddingCache: Send + Sync {
    fn get(&self, text: &str) -> Option<Vec<f32>>;

    /// Store an embedding. Failures are reported but never abort a query.
    fn put(&self, text: &str, embedding: &[f32]) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local cache behind an `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryEmbeddingCache {
    entries: RwLock<HashMap<String, Vec<f32>>>,
}

impl InMemoryEmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EmbeddingCache for InMemoryEmbeddingCache {
    fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.entries.read().ok()?.get(text).cloned()
    }

    fn put(&self, text: &str, embedding: &[f32]) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| anyhow::anyhow!("embedding cache lock poisoned: {e}"))?;
        entries.insert(text.to_string(), embedding.to_vec());
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

/// JSON-file cache. Loaded once at open, written through on every new entry using
/// a temp file + rename so a crash never leaves a half-written cache.
#[derive(Debug)]
pub struct FileEmbeddingCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, Vec<f32>>>,
}

impl FileEmbeddingCache {
    /// Open the cache at `path`. A missing file is an empty cache.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read embedding cache {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse embedding cache {}", path.display()))?
        } else {
            HashMap::new()
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "embedding cache opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, Vec<f32>>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let tmp_path = self.path.with_extension("tmp");
        let json = serde_json::to_vec(entries).context("failed to serialize embedding cache")?;
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path).context("failed to rename temp cache file")?;
        Ok(())
    }
}

impl EmbeddingCache for FileEmbeddingCache {
    fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.entries.lock().ok()?.get(text).cloned()
    }

    fn put(&self, text: &str, embedding: &[f32]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("embedding cache lock poisoned: {e}"))?;
        if entries.get(text).is_some_and(|existing| existing == embedding) {
            return Ok(());
        }
        entries.insert(text.to_string(), embedding.to_vec());
        self.persist(&entries)
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}
