use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::retrieval::mood::MoodTable;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ItineraConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub generation: GenerationConfig,
    pub timeouts: TimeoutConfig,
    pub mood: MoodTable,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// `"stdio"` or `"http"`.
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite knowledge database holding `entities`, `relations` and `entities_vec`.
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    /// Query embedding cache: `"off"`, `"memory"` or `"file"`.
    pub query_cache: String,
    pub query_cache_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of vector-search hits per query.
    pub top_k: usize,
    /// Maximum first-degree facts fetched per primary entity.
    pub neighbor_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub max_context_chars: usize,
    pub description_preview_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    /// Usually supplied via `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// Per-stage collaborator timeouts in milliseconds. `0` disables the bound.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimeoutConfig {
    pub embed_ms: u64,
    pub vector_search_ms: u64,
    pub graph_expand_ms: u64,
    pub generate_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 7420,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_itinera_dir()
            .join("knowledge.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let dir = default_itinera_dir();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir: dir.join("models").to_string_lossy().into_owned(),
            query_cache: "file".into(),
            query_cache_path: dir.join("query_embeddings.json").to_string_lossy().into_owned(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            neighbor_limit: 10,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_context_chars: crate::retrieval::prompt::DEFAULT_MAX_CONTEXT_CHARS,
            description_preview_chars: crate::retrieval::context::DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: "gemini-2.0-flash".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            api_key: None,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embed_ms: 10_000,
            vector_search_ms: 5_000,
            graph_expand_ms: 5_000,
            generate_ms: 60_000,
        }
    }
}

impl TimeoutConfig {
    fn bound(ms: u64) -> Option<Duration> {
        (ms > 0).then(|| Duration::from_millis(ms))
    }

    pub fn embed(&self) -> Option<Duration> {
        Self::bound(self.embed_ms)
    }

    pub fn vector_search(&self) -> Option<Duration> {
        Self::bound(self.vector_search_ms)
    }

    pub fn graph_expand(&self) -> Option<Duration> {
        Self::bound(self.graph_expand_ms)
    }

    pub fn generate(&self) -> Option<Duration> {
        Self::bound(self.generate_ms)
    }
}

/// Returns `~/.itinera/`
pub fn default_itinera_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".itinera")
}

/// Returns the default config file path: `~/.itinera/config.toml`
pub fn default_config_path() -> PathBuf {
    default_itinera_dir().join("config.toml")
}

impl ItineraConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            ItineraConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (ITINERA_DB, ITINERA_LOG_LEVEL,
    /// ITINERA_TOP_K, GEMINI_API_KEY, GOOGLE_API_KEY).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ITINERA_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("ITINERA_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Some(k) = std::env::var("ITINERA_TOP_K")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.retrieval.top_k = k;
        }
        if self.generation.api_key.is_none() {
            self.generation.api_key = std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("GOOGLE_API_KEY"))
                .ok()
                .filter(|k| !k.is_empty());
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
