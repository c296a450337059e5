//! Generation backends.
//!
//! The engine hands a [`GenerationRequest`] to a [`Generator`] and returns its text.
//! [`gemini::GeminiGenerator`] is the bundled implementation.

pub mod gemini;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::retrieval::prompt::GenerationRequest;

/// Opaque text generation.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Create a generator from config. Only `"gemini"` is supported.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(gemini::GeminiGenerator::new(config)?)),
        other => anyhow::bail!("unknown generation provider: {other}. Supported: gemini"),
    }
}
