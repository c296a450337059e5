//! Typed pipeline errors.
//!
//! Every failure the engine surfaces names the stage it came from. Collaborator
//! failures (embedding, vector search, graph expansion, generation, timeouts) are
//! retryable by the caller; empty retrieval, oversized context and invalid input
//! are terminal for the query.

use std::time::Duration;

/// Pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embed,
    VectorSearch,
    GraphExpand,
    Assemble,
    Generate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embed => "embed",
            Self::VectorSearch => "vector_search",
            Self::GraphExpand => "graph_expand",
            Self::Assemble => "assemble",
            Self::Generate => "generate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the retrieval and synthesis pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The query was empty or whitespace only.
    #[error("query must not be empty")]
    InvalidQuery,

    /// Vector search returned zero hits.
    #[error("no relevant entities found for query")]
    EmptyRetrieval,

    /// The embedder failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector search client failed.
    #[error("vector search failed: {0}")]
    Retrieval(String),

    /// The graph expansion client failed or broke its contract.
    #[error("graph expansion failed: {0}")]
    Graph(String),

    /// The generation backend failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// A collaborator call exceeded its configured timeout.
    #[error("{stage} timed out after {}ms", timeout.as_millis())]
    Timeout { stage: Stage, timeout: Duration },

    /// Even the minimal context rendering exceeds the configured limit.
    #[error("context too large: minimal rendering needs {required} chars, limit is {limit}")]
    ContextTooLarge { required: usize, limit: usize },
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stage that failed, if the error is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::InvalidQuery => None,
            Self::Embedding(_) => Some(Stage::Embed),
            Self::EmptyRetrieval | Self::Retrieval(_) => Some(Stage::VectorSearch),
            Self::Graph(_) => Some(Stage::GraphExpand),
            Self::Generation(_) => Some(Stage::Generate),
            Self::ContextTooLarge { .. } => Some(Stage::Assemble),
            Self::Timeout { stage, .. } => Some(*stage),
        }
    }

    /// Whether the caller may retry the same query (with backoff).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_)
                | Self::Retrieval(_)
                | Self::Graph(_)
                | Self::Generation(_)
                | Self::Timeout { .. }
        )
    }

    /// End-user message. Never includes raw collaborator error text.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidQuery => "Please enter a travel question.",
            Self::EmptyRetrieval => {
                "No relevant information found. Try rephrasing your question or naming a place."
            }
            Self::ContextTooLarge { .. } => {
                "Your question is too broad. Please narrow it to fewer places or activities."
            }
            Self::Embedding(_) => {
                "Could not process your question right now. Please try again in a moment."
            }
            Self::Retrieval(_) => {
                "The destination search service is unavailable. Please try again in a moment."
            }
            Self::Graph(_) => {
                "The travel knowledge graph is unavailable. Please try again in a moment."
            }
            Self::Generation(_) => {
                "The itinerary writer is unavailable. Please try again in a moment."
            }
            Self::Timeout { .. } => "The request took too long. Please try again.",
        }
    }
}
