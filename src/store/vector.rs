//! sqlite-vec KNN search over `entities_vec`, hydrated from `entities`.

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{params_from_iter, Connection};

use super::{lock, SharedConnection, VectorSearch};
use crate::embedding::EMBEDDING_DIM;
use crate::retrieval::types::{Entity, EntityCategory, ScoredEntity};

/// Vector search backed by the knowledge database.
pub struct SqliteVectorSearch {
    conn: SharedConnection,
}

impl SqliteVectorSearch {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl VectorSearch for SqliteVectorSearch {
    fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredEntity>> {
        anyhow::ensure!(
            embedding.len() == EMBEDDING_DIM,
            "query embedding has {} dimensions, index expects {EMBEDDING_DIM}",
            embedding.len()
        );
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = lock(&self.conn)?;
        let nearest = knn(&conn, embedding, k)?;
        let ids: Vec<&str> = nearest.iter().map(|(id, _)| id.as_str()).collect();
        let mut entities = fetch_entities(&conn, &ids)?;

        let mut results = Vec::with_capacity(nearest.len());
        for (id, distance) in nearest {
            match entities.remove(&id) {
                Some(entity) => results.push(ScoredEntity::new(entity, distance_to_similarity(distance))),
                None => tracing::warn!(id = %id, "vector without entity record, skipped"),
            }
        }
        Ok(results)
    }
}

/// Convert an L2 distance between unit vectors to cosine similarity.
fn distance_to_similarity(distance: f64) -> f32 {
    (1.0 - distance * distance / 2.0) as f32
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

fn knn(conn: &Connection, embedding: &[f32], k: usize) -> Result<Vec<(String, f64)>> {
    let mut stmt = conn.prepare(
        "SELECT id, distance FROM entities_vec \
         WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(
            rusqlite::params![embedding_to_bytes(embedding), k as i64],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn fetch_entities(conn: &Connection, ids: &[&str]) -> Result<HashMap<String, Entity>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT id, name, category, description FROM entities WHERE id IN ({placeholders})"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut entities = HashMap::with_capacity(rows.len());
    for (id, name, category, description) in rows {
        let category: EntityCategory = category.parse().map_err(anyhow::Error::msg)?;
        entities.insert(id.clone(), Entity { id, name, category, description });
    }
    Ok(entities)
}
