//! Parameters shared by the `plan_trip` and `preview_context` MCP tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Upper bound on `top_k` accepted from MCP clients.
pub const MAX_TOP_K: usize = 20;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PlanTripParams {
    /// Natural-language travel question.
    #[schemars(
        description = "Natural-language travel question, e.g. 'create a romantic 4 day itinerary for Vietnam'"
    )]
    pub query: String,

    /// Number of vector hits to retrieve (1-20). Defaults to the configured top_k.
    #[schemars(description = "Number of entities to retrieve (1-20). Defaults to the server's top_k.")]
    pub top_k: Option<usize>,
}

impl PlanTripParams {
    /// Resolve `top_k` against the server default.
    pub fn k(&self, default: usize) -> Result<usize, String> {
        match self.top_k {
            None => Ok(default),
            Some(k) if (1..=MAX_TOP_K).contains(&k) => Ok(k),
            Some(k) => Err(format!("top_k must be between 1 and {MAX_TOP_K}, got {k}")),
        }
    }
}
