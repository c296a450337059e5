//! The request-time pipeline.
//!
//! query → (cache) → embed → vector search → graph expansion → synthesize →
//! classify mood → assemble prompt → generate.
//!
//! Each collaborator call runs under its stage timeout and maps failures to the
//! stage's [`Error`] variant. Nothing is retried here and no partial result is
//! returned on failure.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{ItineraConfig, TimeoutConfig};
use crate::embedding::cache::EmbeddingCache;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{Error, Result, Stage};
use crate::generation::{self, Generator};
use crate::retrieval::context::{synthesize, RenderOptions};
use crate::retrieval::mood::{MoodClassifier, MoodTable};
use crate::retrieval::prompt::{GenerationRequest, PromptAssembler};
use crate::retrieval::types::{Expansion, ScoredEntity};
use crate::store::graph::SqliteGraph;
use crate::store::vector::SqliteVectorSearch;
use crate::store::{GraphExpand, SharedConnection, VectorSearch};

/// Hybrid retrieval and context synthesis engine.
pub struct Engine {
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Option<Arc<dyn EmbeddingCache>>,
    vectors: Arc<dyn VectorSearch>,
    graph: Arc<dyn GraphExpand>,
    generator: Option<Arc<dyn Generator>>,
    classifier: MoodClassifier,
    assembler: PromptAssembler,
    timeouts: TimeoutConfig,
}

impl Engine {
    /// Engine with the default mood table, prompt limits and timeouts, no cache and
    /// no generator.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorSearch>,
        graph: Arc<dyn GraphExpand>,
    ) -> Self {
        Self {
            embedder,
            cache: None,
            vectors,
            graph,
            generator: None,
            classifier: MoodClassifier::default(),
            assembler: PromptAssembler::default(),
            timeouts: TimeoutConfig::default(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_cache(mut self, cache: Option<Arc<dyn EmbeddingCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_mood_table(mut self, table: &MoodTable) -> Self {
        self.classifier = MoodClassifier::new(table);
        self
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Wire the engine to the local knowledge database, ONNX embedder, configured
    /// query cache and generation backend.
    ///
    /// A missing generation API key is not fatal: the engine can still prepare
    /// prompts, and `answer` reports a generation error.
    pub fn from_config(config: &ItineraConfig) -> anyhow::Result<Self> {
        let db_path = config.resolved_db_path();
        let conn: SharedConnection = Arc::new(Mutex::new(crate::db::open_database(&db_path)?));

        let embedder = embedding::create_provider(&config.embedding)?;
        let cache = embedding::create_cache(&config.embedding)?;
        let vectors = Arc::new(SqliteVectorSearch::new(Arc::clone(&conn)));
        let graph = Arc::new(SqliteGraph::new(conn, config.retrieval.neighbor_limit));

        let assembler = PromptAssembler::new(
            config.prompt.max_context_chars,
            RenderOptions {
                description_preview_chars: config.prompt.description_preview_chars,
            },
        );

        let mut engine = Self::new(embedder, vectors, graph)
            .with_cache(cache)
            .with_mood_table(&config.mood)
            .with_assembler(assembler)
            .with_timeouts(config.timeouts.clone());

        match generation::create_generator(&config.generation) {
            Ok(generator) => engine = engine.with_generator(generator),
            Err(e) => warn!(error = %e, "generation backend unavailable, answers will fail"),
        }

        info!(db = %db_path.display(), "engine ready");
        Ok(engine)
    }

    /// Answer a travel question with grounded, mood-conditioned generated text.
    pub async fn answer(&self, query: &str, k: usize) -> Result<String> {
        let request = self.prepare(query, k).await?;
        let generator = self
            .generator
            .clone()
            .ok_or_else(|| Error::Generation("no generation backend configured".into()))?;

        let started = Instant::now();
        let text = bounded(Stage::Generate, self.timeouts.generate(), async move {
            generator
                .generate(&request)
                .await
                .map_err(|e| Error::Generation(format!("{e:#}")))
        })
        .await?;

        info!(
            chars = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answer generated"
        );
        Ok(text)
    }

    /// Run the pipeline up to, but not including, generation.
    pub async fn prepare(&self, query: &str, k: usize) -> Result<GenerationRequest> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery);
        }

        let span = info_span!("query", id = %uuid::Uuid::now_v7(), k);
        async move {
            let mood = self.classifier.classify(query);
            info!(mood = %mood.mood, "mood classified");

            let embedding = self.embed(query).await?;

            let hits = self.search(embedding, k).await?;
            if hits.is_empty() {
                info!("no vector hits");
                return Err(Error::EmptyRetrieval);
            }

            let ids: Vec<String> = hits.iter().map(|h| h.entity.id.clone()).collect();
            let expansions = self.expand(ids).await?;

            let summary = synthesize(hits, expansions)?;
            info!(
                primaries = summary.primaries().len(),
                facts = summary.fact_count(),
                entities = summary.entities().len(),
                "context synthesized"
            );

            self.assembler.assemble(query, &summary, &mood)
        }
        .instrument(span)
        .await
    }

    async fn embed(&self, query: &str) -> Result<Vec<f32>> {
        if let Some(embedding) = self.cached(query).await {
            debug!("query embedding cache hit");
            return Ok(embedding);
        }

        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        let embedding = bounded(Stage::Embed, self.timeouts.embed(), async move {
            tokio::task::spawn_blocking(move || embedder.embed(&text))
                .await
                .map_err(|e| Error::Embedding(format!("embedding task failed: {e}")))?
                .map_err(|e| Error::Embedding(format!("{e:#}")))
        })
        .await?;

        if let Some(cache) = &self.cache {
            let cache = Arc::clone(cache);
            let text = query.to_string();
            let vector = embedding.clone();
            match tokio::task::spawn_blocking(move || cache.put(&text, &vector)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "failed to cache query embedding"),
                Err(e) => warn!(error = %e, "embedding cache task failed"),
            }
        }
        Ok(embedding)
    }

    /// Cache lookup off the runtime threads; file-backed caches lock and may block.
    async fn cached(&self, query: &str) -> Option<Vec<f32>> {
        let cache = Arc::clone(self.cache.as_ref()?);
        let text = query.to_string();
        match tokio::task::spawn_blocking(move || cache.get(&text)).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "embedding cache task failed");
                None
            }
        }
    }

    async fn search(&self, embedding: Vec<f32>, k: usize) -> Result<Vec<ScoredEntity>> {
        let vectors = Arc::clone(&self.vectors);
        let mut hits = bounded(Stage::VectorSearch, self.timeouts.vector_search(), async move {
            tokio::task::spawn_blocking(move || vectors.search(&embedding, k))
                .await
                .map_err(|e| Error::Retrieval(format!("vector search task failed: {e}")))?
                .map_err(|e| Error::Retrieval(format!("{e:#}")))
        })
        .await?;

        if hits.len() > k {
            warn!(returned = hits.len(), k, "vector search returned more than k hits");
            hits.truncate(k);
        }
        info!(hits = hits.len(), "vector search done");
        Ok(hits)
    }

    async fn expand(&self, ids: Vec<String>) -> Result<HashMap<String, Expansion>> {
        let graph = Arc::clone(&self.graph);
        bounded(Stage::GraphExpand, self.timeouts.graph_expand(), async move {
            tokio::task::spawn_blocking(move || graph.expand(&ids))
                .await
                .map_err(|e| Error::Graph(format!("graph task failed: {e}")))?
                .map_err(|e| Error::Graph(format!("{e:#}")))
        })
        .await
    }
}

/// Await `fut`, failing with [`Error::Timeout`] if `limit` elapses first.
async fn bounded<T, F>(stage: Stage, limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(timeout) => tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| Error::Timeout { stage, timeout })?,
        None => fut.await,
    }
}
