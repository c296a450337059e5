#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use itinera::db;
use itinera::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use itinera::generation::Generator;
use itinera::retrieval::prompt::GenerationRequest;
use itinera::store::vector::embedding_to_bytes;
use itinera::store::SharedConnection;
use rusqlite::{params, Connection};

/// Open a fresh in-memory knowledge database with the schema applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Generate a deterministic 384-dim unit embedding with a spike at position `seed`.
/// Distinct seeds produce orthogonal vectors.
pub fn test_embedding(seed: u16) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed as usize % EMBEDDING_DIM] = 1.0;
    v
}

/// Normalized weighted sum of spike embeddings, e.g. `[(0, 1.0), (100, 0.5)]`.
pub fn blend(weights: &[(u16, f32)]) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    for &(seed, w) in weights {
        v[seed as usize % EMBEDDING_DIM] += w;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

pub fn insert_entity(
    conn: &Connection,
    id: &str,
    name: &str,
    category: &str,
    description: &str,
    embedding: Option<&[f32]>,
) {
    conn.execute(
        "INSERT INTO entities (id, name, category, description) VALUES (?1, ?2, ?3, ?4)",
        params![id, name, category, description],
    )
    .unwrap();
    if let Some(embedding) = embedding {
        conn.execute(
            "INSERT INTO entities_vec (id, embedding) VALUES (?1, ?2)",
            params![id, embedding_to_bytes(embedding)],
        )
        .unwrap();
    }
}

pub fn insert_relation(
    conn: &Connection,
    source: &str,
    relation_type: &str,
    target: &str,
    properties: Option<&str>,
) {
    conn.execute(
        "INSERT INTO relations (source_id, target_id, relation_type, properties) \
         VALUES (?1, ?2, ?3, ?4)",
        params![source, target, relation_type, properties],
    )
    .unwrap();
}

/// A small northern Vietnam knowledge base.
///
/// Embedding seeds: Sapa 0, Ha Long 100, Hanoi 200, Hoi An 300. Lao Cai and
/// Fansipan are graph-only.
pub fn vietnam_db() -> SharedConnection {
    let conn = test_db();
    insert_entity(
        &conn,
        "sapa_trek",
        "Sapa Trekking",
        "activity",
        "Multi-day hikes through terraced rice fields and Hmong villages.",
        Some(&test_embedding(0)),
    );
    insert_entity(
        &conn,
        "ha_long_bay",
        "Ha Long Bay",
        "location",
        "Thousands of limestone karsts rising from emerald water.",
        Some(&test_embedding(100)),
    );
    insert_entity(
        &conn,
        "hanoi",
        "Hanoi",
        "location",
        "Capital city known for its Old Quarter and street food.",
        Some(&test_embedding(200)),
    );
    insert_entity(
        &conn,
        "hoi_an",
        "Hoi An",
        "location",
        "Lantern-lit ancient town on the Thu Bon river.",
        Some(&test_embedding(300)),
    );
    insert_entity(
        &conn,
        "lao_cai_province",
        "Lao Cai Province",
        "region",
        "Mountainous province on the Chinese border.",
        None,
    );
    insert_entity(
        &conn,
        "fansipan",
        "Fansipan",
        "location",
        "The highest peak in Indochina at 3,143 m.",
        None,
    );
    insert_relation(&conn, "sapa_trek", "RELATED_TO", "lao_cai_province", None);
    insert_relation(
        &conn,
        "fansipan",
        "HAS_ACTIVITY",
        "sapa_trek",
        Some(r#"{"difficulty":"hard"}"#),
    );
    insert_relation(
        &conn,
        "hanoi",
        "CONNECTED_TO",
        "ha_long_bay",
        Some(r#"{"distance_km":165}"#),
    );
    Arc::new(Mutex::new(conn))
}

/// Embedder returning fixed vectors per query text. Unknown text is an error.
#[derive(Default)]
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    pub calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn with(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), embedding);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for FixedEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no test vector for {text:?}"))
    }
}

/// Generator that records the last request and echoes the query.
#[derive(Default)]
pub struct RecordingGenerator {
    pub last: Mutex<Option<GenerationRequest>>,
    pub calls: AtomicUsize,
}

impl RecordingGenerator {
    pub fn last_request(&self) -> GenerationRequest {
        self.last.lock().unwrap().clone().expect("generator was not called")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        Ok(format!("[{}] {}", request.mood.mood, request.query))
    }
}
