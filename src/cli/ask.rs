//! CLI `ask` command: answer one question, or print its prompt with `--dry-run`.

use anyhow::Result;

use itinera::config::ItineraConfig;
use itinera::Engine;

/// Exits with status 1 after reporting a failed query.
pub async fn ask(config: &ItineraConfig, query: &str, k: usize, dry_run: bool) -> Result<()> {
    let engine = Engine::from_config(config)?;
    if let Err(e) = run(&engine, query, k, dry_run).await {
        report(&e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(engine: &Engine, query: &str, k: usize, dry_run: bool) -> itinera::Result<()> {
    if !dry_run {
        let text = engine.answer(query, k).await?;
        println!("{text}");
        return Ok(());
    }

    let request = engine.prepare(query, k).await?;
    println!("Mood: {} ({})", request.mood.mood, request.mood.description);
    if request.omitted_facts > 0 {
        println!("Omitted facts: {}", request.omitted_facts);
    }
    println!();
    println!("--- system instruction ---");
    println!("{}", request.system_instruction);
    println!();
    println!("--- user payload ---");
    println!("{}", request.user_payload);
    Ok(())
}

/// Print the user-facing message and log the underlying cause.
pub fn report(err: &itinera::Error) {
    tracing::error!(
        error = %err,
        stage = ?err.stage(),
        retryable = err.is_retryable(),
        "query failed"
    );
    eprintln!("{}", err.user_message());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use itinera::embedding::EmbeddingProvider;
    use itinera::retrieval::types::{Expansion, ScoredEntity};
    use itinera::store::{GraphExpand, VectorSearch};

    struct UnitEmbedder;

    impl EmbeddingProvider for UnitEmbedder {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    struct NoHits;

    impl VectorSearch for NoHits {
        fn search(&self, _embedding: &[f32], _k: usize) -> anyhow::Result<Vec<ScoredEntity>> {
            Ok(Vec::new())
        }
    }

    impl GraphExpand for NoHits {
        fn expand(&self, _ids: &[String]) -> anyhow::Result<HashMap<String, Expansion>> {
            Ok(HashMap::new())
        }
    }

    fn empty_engine() -> Engine {
        Engine::new(Arc::new(UnitEmbedder), Arc::new(NoHits), Arc::new(NoHits))
    }

    #[tokio::test]
    async fn test_failed_query_is_an_error() {
        let engine = empty_engine();
        for dry_run in [false, true] {
            let err = run(&engine, "beaches in Antarctica", 5, dry_run)
                .await
                .unwrap_err();
            assert!(matches!(err, itinera::Error::EmptyRetrieval));
        }
    }

    #[tokio::test]
    async fn test_blank_query_is_an_error() {
        let err = run(&empty_engine(), "  ", 5, false).await.unwrap_err();
        assert!(matches!(err, itinera::Error::InvalidQuery));
    }
}
