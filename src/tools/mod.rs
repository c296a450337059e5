pub mod plan_trip;

use plan_trip::PlanTripParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::sync::Arc;

use itinera::Engine;

/// The Itinera MCP tool handler. Every session shares one [`Engine`].
#[derive(Clone)]
pub struct ItineraTools {
    tool_router: ToolRouter<Self>,
    engine: Arc<Engine>,
    default_k: usize,
}

#[tool_router]
impl ItineraTools {
    pub fn new(engine: Arc<Engine>, default_k: usize) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
            default_k,
        }
    }

    /// Answer a travel question from the knowledge base.
    #[tool(description = "Answer a travel question (itineraries, destinations, activities) using facts retrieved from the travel knowledge base. The tone follows the mood of the question.")]
    async fn plan_trip(
        &self,
        Parameters(params): Parameters<PlanTripParams>,
    ) -> Result<String, String> {
        let k = params.k(self.default_k)?;
        tracing::info!(query_len = params.query.len(), k, "plan_trip called");

        self.engine
            .answer(&params.query, k)
            .await
            .map_err(|e| failure("plan_trip", &e))
    }

    /// Show the retrieved context and assembled prompt without generating.
    #[tool(description = "Preview what plan_trip would send to the language model: the inferred mood, the synthesized context and the prompt sections. Does not call the model.")]
    async fn preview_context(
        &self,
        Parameters(params): Parameters<PlanTripParams>,
    ) -> Result<String, String> {
        let k = params.k(self.default_k)?;
        tracing::info!(query_len = params.query.len(), k, "preview_context called");

        let request = self
            .engine
            .prepare(&params.query, k)
            .await
            .map_err(|e| failure("preview_context", &e))?;

        serde_json::to_string(&request).map_err(|e| format!("serialization failed: {e}"))
    }
}

/// Log the full error and hand the client only the user-facing message.
fn failure(tool: &str, err: &itinera::Error) -> String {
    tracing::warn!(
        tool,
        error = %err,
        stage = ?err.stage(),
        retryable = err.is_retryable(),
        "tool call failed"
    );
    err.user_message().to_string()
}

#[tool_handler]
impl ServerHandler for ItineraTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Itinera answers travel questions from a curated knowledge base. Use plan_trip \
                 for an answer and preview_context to inspect the retrieved facts."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
