//! Hybrid retrieval and context synthesis for travel questions.
//!
//! Itinera answers natural-language travel queries ("create a romantic 4 day
//! itinerary for Vietnam") by combining two retrieval sources over one knowledge
//! base and handing a grounded prompt to a text generator:
//!
//! 1. The query is embedded (all-MiniLM-L6-v2, 384 dimensions) and the top-k most
//!    similar entities are fetched from a vector index.
//! 2. Each hit is expanded one hop through the relationship graph.
//! 3. Hits and their facts are merged into a ranked, deduplicated
//!    [`ContextSummary`](retrieval::context::ContextSummary).
//! 4. A mood is inferred from the query text and the context is rendered into a
//!    bounded prompt that instructs the model to ground its answer.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec) for
//!   vector search and a `relations` table for the graph
//! - **Embeddings**: Local ONNX Runtime, with an optional query embedding cache
//! - **Generation**: Gemini `generateContent` over HTTPS
//! - **Transport**: interactive CLI, or MCP over stdio / Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: knowledge database connection, schema and health checks
//! - [`embedding`]: query embedding and the embedding cache
//! - [`error`]: the typed pipeline error
//! - [`generation`]: generation backends
//! - [`retrieval`]: context synthesis, mood classification, prompt assembly and the
//!   [`Engine`](retrieval::engine::Engine)
//! - [`store`]: vector search and graph expansion adapters

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod retrieval;
pub mod store;

pub use error::{Error, Result};
pub use retrieval::engine::Engine;
