//! Retrieval, context synthesis and prompt assembly.

pub mod context;
pub mod engine;
pub mod mood;
pub mod prompt;
pub mod types;
