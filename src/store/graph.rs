//! First-degree graph expansion over the `relations` table.
//!
//! Relations are followed in both directions. Each id yields at most
//! `neighbor_limit` facts, ordered by relation insertion order. Self-loops are
//! ignored and there is no multi-hop traversal.

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{params, Connection};

use super::{lock, GraphExpand, SharedConnection};
use crate::retrieval::types::{Entity, EntityCategory, Expansion, Relation};

/// Graph expansion backed by the knowledge database.
pub struct SqliteGraph {
    conn: SharedConnection,
    neighbor_limit: usize,
}

impl SqliteGraph {
    pub fn new(conn: SharedConnection, neighbor_limit: usize) -> Self {
        Self {
            conn,
            neighbor_limit,
        }
    }
}

impl GraphExpand for SqliteGraph {
    fn expand(&self, ids: &[String]) -> Result<HashMap<String, Expansion>> {
        let conn = lock(&self.conn)?;
        let mut expansions = HashMap::with_capacity(ids.len());
        for id in ids {
            if expansions.contains_key(id) {
                continue;
            }
            let expansion = expand_one(&conn, id, self.neighbor_limit)?;
            tracing::debug!(id = %id, facts = expansion.relations.len(), "expanded entity");
            expansions.insert(id.clone(), expansion);
        }
        Ok(expansions)
    }
}

fn expand_one(conn: &Connection, id: &str, limit: usize) -> Result<Expansion> {
    let mut stmt = conn.prepare_cached(
        "SELECT r.source_id, r.target_id, r.relation_type, r.properties, \
                n.id, n.name, n.category, n.description \
         FROM relations r \
         JOIN entities n ON n.id = CASE WHEN r.source_id = ?1 THEN r.target_id ELSE r.source_id END \
         WHERE (r.source_id = ?1 OR r.target_id = ?1) AND r.source_id != r.target_id \
         ORDER BY r.id \
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(params![id, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut expansion = Expansion::default();
    for (source_id, target_id, relation_type, properties, nid, name, category, description) in rows
    {
        let properties = properties.and_then(|raw| parse_properties(&source_id, &target_id, &raw));
        let category: EntityCategory = category.parse().map_err(anyhow::Error::msg)?;
        expansion.relations.push(Relation {
            source_id,
            target_id,
            relation_type,
            properties,
        });
        if !expansion.neighbors.iter().any(|n| n.id == nid) {
            expansion.neighbors.push(Entity {
                id: nid,
                name,
                category,
                description,
            });
        }
    }
    Ok(expansion)
}

/// Relation properties are stored as JSON text. Malformed text is dropped with a
/// warning; the relation itself is kept.
fn parse_properties(source_id: &str, target_id: &str, raw: &str) -> Option<serde_json::Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                source = %source_id,
                target = %target_id,
                error = %e,
                "relation properties are not valid JSON, ignored"
            );
            None
        }
    }
}
