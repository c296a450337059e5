//! Context synthesis: vector hits + graph expansions → one deduplicated summary.
//!
//! [`synthesize`] ranks the primary hits (score descending, id ascending on ties),
//! pairs every relation in each expansion with the neighbor at its other end, and
//! builds a flattened entity set in which each id appears exactly once. A neighbor
//! that is also a primary hit keeps its primary record and rank.
//!
//! [`ContextSummary::render`] produces the deterministic prompt text: one block per
//! primary in rank order, one line per fact in graph-client order.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::retrieval::types::{Entity, Expansion, Relation, ScoredEntity};

/// Default number of description characters shown per entity line.
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

/// One relationship fact attached to a primary entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fact {
    /// Id of the neighbor at the other end of `relation`.
    pub neighbor_id: String,
    pub relation: Relation,
}

/// Rendering knobs.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub description_preview_chars: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            description_preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// The synthesized, ranked and deduplicated context for one query.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSummary {
    primaries: Vec<ScoredEntity>,
    facts: HashMap<String, Vec<Fact>>,
    entities: Vec<Entity>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

/// Merge ranked vector hits with their graph expansions.
///
/// Fails with [`Error::EmptyRetrieval`] when `primaries` is empty and with
/// [`Error::Graph`] when a primary has no entry in `expansions`.
pub fn synthesize(
    primaries: Vec<ScoredEntity>,
    mut expansions: HashMap<String, Expansion>,
) -> Result<ContextSummary> {
    if primaries.is_empty() {
        return Err(Error::EmptyRetrieval);
    }

    let mut ranked = primaries;
    ranked.sort_by(|a, b| {
        rank_key(b.score)
            .total_cmp(&rank_key(a.score))
            .then_with(|| a.entity.id.cmp(&b.entity.id))
    });
    let mut seen = HashSet::new();
    ranked.retain(|p| seen.insert(p.entity.id.clone()));

    let mut entities: Vec<Entity> = Vec::with_capacity(ranked.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for primary in &ranked {
        positions.insert(primary.entity.id.clone(), entities.len());
        entities.push(primary.entity.clone());
    }

    let mut facts = HashMap::with_capacity(ranked.len());
    for primary in &ranked {
        let id = primary.entity.id.as_str();
        let expansion = expansions
            .remove(id)
            .ok_or_else(|| Error::Graph(format!("no expansion returned for entity {id}")))?;

        let neighbors: HashMap<&str, &Entity> = expansion
            .neighbors
            .iter()
            .map(|n| (n.id.as_str(), n))
            .collect();

        let mut list = Vec::with_capacity(expansion.relations.len());
        for relation in expansion.relations {
            let Some(other) = relation.other_end(id).map(str::to_string) else {
                debug!(primary = id, relation = %relation.relation_type, "relation does not touch primary, skipped");
                continue;
            };
            let Some(neighbor) = neighbors.get(other.as_str()) else {
                debug!(primary = id, neighbor = %other, "relation endpoint missing from neighbors, skipped");
                continue;
            };
            if !positions.contains_key(&other) {
                positions.insert(other.clone(), entities.len());
                entities.push((*neighbor).clone());
            }
            list.push(Fact {
                neighbor_id: other,
                relation,
            });
        }
        facts.insert(id.to_string(), list);
    }

    Ok(ContextSummary {
        primaries: ranked,
        facts,
        entities,
        positions,
    })
}

/// NaN scores rank below every real score.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

impl ContextSummary {
    /// Primary hits in rank order.
    pub fn primaries(&self) -> &[ScoredEntity] {
        &self.primaries
    }

    /// Facts recorded for a primary id, in graph-client order.
    pub fn facts(&self, primary_id: &str) -> &[Fact] {
        self.facts.get(primary_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Neighbor entities of a primary, in fact order.
    pub fn neighbors(&self, primary_id: &str) -> Vec<&Entity> {
        self.facts(primary_id)
            .iter()
            .filter_map(|f| self.entity(&f.neighbor_id))
            .collect()
    }

    /// Flattened, deduplicated entity set: primaries first, then neighbors in
    /// first-seen order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.positions.get(id).map(|&i| &self.entities[i])
    }

    /// Total number of facts across all primaries.
    pub fn fact_count(&self) -> usize {
        self.facts.values().map(Vec::len).sum()
    }

    /// Per-primary fact counts in rank order.
    pub fn fact_counts(&self) -> Vec<usize> {
        self.primaries
            .iter()
            .map(|p| self.facts(&p.entity.id).len())
            .collect()
    }

    /// Render every fact.
    pub fn render(&self, options: &RenderOptions) -> String {
        self.render_kept(&self.fact_counts(), options)
    }

    /// Render keeping the first `kept[i]` facts of the i-th primary. Missing
    /// entries keep nothing. Dropped facts are announced with a marker line.
    pub fn render_kept(&self, kept: &[usize], options: &RenderOptions) -> String {
        self.render_selection(kept, true, options)
    }

    /// Like [`render_kept`](Self::render_kept), but `mark_omitted = false` leaves out
    /// the omission markers. With every count at zero that is the primaries-only
    /// rendering, the shortest form of the context.
    pub fn render_selection(
        &self,
        kept: &[usize],
        mark_omitted: bool,
        options: &RenderOptions,
    ) -> String {
        let preview = options.description_preview_chars;
        let mut out = String::new();

        for (rank, primary) in self.primaries.iter().enumerate() {
            let entity = &primary.entity;
            out.push_str(&format!(
                "{}. {} ({}, score {:.2})",
                rank + 1,
                entity.name,
                entity.category,
                primary.score
            ));
            push_description(&mut out, &entity.description, preview);
            out.push('\n');

            let facts = self.facts(&entity.id);
            let keep = kept.get(rank).copied().unwrap_or(0).min(facts.len());
            for fact in &facts[..keep] {
                out.push_str(&self.render_fact(&entity.id, fact, preview));
                out.push('\n');
            }
            let omitted = facts.len() - keep;
            if omitted > 0 && mark_omitted {
                let noun = if omitted == 1 { "fact" } else { "facts" };
                out.push_str(&format!("   - ({omitted} more related {noun} omitted)\n"));
            }
        }

        out
    }

    fn render_fact(&self, primary_id: &str, fact: &Fact, preview: usize) -> String {
        let rel = &fact.relation;
        let arrow = if rel.source_id == primary_id {
            format!("-[{}]->", rel.relation_type)
        } else {
            format!("<-[{}]-", rel.relation_type)
        };

        let mut line = match self.entity(&fact.neighbor_id) {
            Some(n) => format!("   - {arrow} {} ({})", n.name, n.category),
            None => format!("   - {arrow} {}", fact.neighbor_id),
        };
        if let Some(props) = render_properties(rel.properties.as_ref()) {
            line.push_str(&format!(" [{props}]"));
        }
        if let Some(n) = self.entity(&fact.neighbor_id) {
            push_description(&mut line, &n.description, preview);
        }
        line
    }
}

fn push_description(out: &mut String, description: &str, max_chars: usize) {
    let description = description.trim();
    if description.is_empty() || max_chars == 0 {
        return;
    }
    out.push_str(": ");
    out.push_str(&truncate_preview(description, max_chars));
}

/// `key=value` pairs of a JSON object, in key order.
fn render_properties(properties: Option<&serde_json::Value>) -> Option<String> {
    let map = properties?.as_object()?;
    if map.is_empty() {
        return None;
    }
    let pairs: Vec<String> = map
        .iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => format!("{k}={s}"),
            other => format!("{k}={other}"),
        })
        .collect();
    Some(pairs.join(", "))
}

/// Truncate content to max_chars characters, appending "..." if truncated.
pub(crate) fn truncate_preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((end, _)) => format!("{}...", &content[..end]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::types::EntityCategory;

    fn entity(id: &str, name: &str, category: EntityCategory) -> Entity {
        Entity::new(id, name, category, "")
    }

    fn hit(id: &str, name: &str, score: f32) -> ScoredEntity {
        ScoredEntity::new(entity(id, name, EntityCategory::Location), score)
    }

    fn empty_expansions(ids: &[&str]) -> HashMap<String, Expansion> {
        ids.iter()
            .map(|id| (id.to_string(), Expansion::default()))
            .collect()
    }

    #[test]
    fn test_empty_primaries_is_error() {
        let result = synthesize(vec![], HashMap::new());
        assert!(matches!(result, Err(Error::EmptyRetrieval)));
    }

    #[test]
    fn test_missing_expansion_is_graph_error() {
        let result = synthesize(vec![hit("a", "A", 0.5)], HashMap::new());
        assert!(matches!(result, Err(Error::Graph(msg)) if msg.contains("a")));
    }

    #[test]
    fn test_ranks_by_score_then_id() {
        let primaries = vec![
            hit("c", "C", 0.7),
            hit("b", "B", 0.9),
            hit("a", "A", 0.7),
            hit("d", "D", f32::NAN),
        ];
        let summary = synthesize(primaries, empty_expansions(&["a", "b", "c", "d"])).unwrap();
        let order: Vec<&str> = summary
            .primaries()
            .iter()
            .map(|p| p.entity.id.as_str())
            .collect();
        assert_eq!(order, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_duplicate_primary_keeps_best_rank() {
        let primaries = vec![hit("a", "A", 0.4), hit("a", "A", 0.8), hit("b", "B", 0.6)];
        let summary = synthesize(primaries, empty_expansions(&["a", "b"])).unwrap();
        assert_eq!(summary.primaries().len(), 2);
        assert_eq!(summary.primaries()[0].entity.id, "a");
        assert!((summary.primaries()[0].score - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_neighbor_that_is_primary_is_not_duplicated() {
        let hoi_an = entity("hoi_an", "Hoi An", EntityCategory::Location);
        let lantern = entity("lantern_tour", "Lantern Tour", EntityCategory::Activity);
        let quang_nam = entity("quang_nam", "Quang Nam", EntityCategory::Region);

        let mut expansions = HashMap::new();
        expansions.insert(
            "hoi_an".to_string(),
            Expansion {
                neighbors: vec![lantern.clone(), quang_nam.clone()],
                relations: vec![
                    Relation::new("hoi_an", "HAS_ACTIVITY", "lantern_tour"),
                    Relation::new("hoi_an", "IS_LOCATED_IN", "quang_nam"),
                ],
            },
        );
        expansions.insert(
            "lantern_tour".to_string(),
            Expansion {
                neighbors: vec![hoi_an.clone()],
                relations: vec![Relation::new("hoi_an", "HAS_ACTIVITY", "lantern_tour")],
            },
        );

        let summary = synthesize(
            vec![
                ScoredEntity::new(hoi_an, 0.9),
                ScoredEntity::new(lantern, 0.8),
            ],
            expansions,
        )
        .unwrap();

        let ids: Vec<&str> = summary.entities().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["hoi_an", "lantern_tour", "quang_nam"]);
        // The fact is still recorded under both primaries
        assert_eq!(summary.facts("hoi_an").len(), 2);
        assert_eq!(summary.facts("lantern_tour").len(), 1);
        assert_eq!(summary.neighbors("lantern_tour")[0].id, "hoi_an");
    }

    #[test]
    fn test_shared_neighbor_appears_once() {
        let region = entity("quang_ninh", "Quang Ninh", EntityCategory::Region);
        let mut expansions = HashMap::new();
        for id in ["ha_long_bay", "bai_tu_long"] {
            expansions.insert(
                id.to_string(),
                Expansion {
                    neighbors: vec![region.clone()],
                    relations: vec![Relation::new(id, "IS_LOCATED_IN", "quang_ninh")],
                },
            );
        }
        let summary = synthesize(
            vec![hit("ha_long_bay", "Ha Long Bay", 0.9), hit("bai_tu_long", "Bai Tu Long", 0.8)],
            expansions,
        )
        .unwrap();

        let count = summary
            .entities()
            .iter()
            .filter(|e| e.id == "quang_ninh")
            .count();
        assert_eq!(count, 1);
        assert_eq!(summary.fact_count(), 2);
    }

    #[test]
    fn test_relation_without_neighbor_is_skipped() {
        let mut expansions = HashMap::new();
        expansions.insert(
            "a".to_string(),
            Expansion {
                neighbors: vec![],
                relations: vec![Relation::new("a", "RELATED_TO", "ghost")],
            },
        );
        let summary = synthesize(vec![hit("a", "A", 0.5)], expansions).unwrap();
        assert!(summary.facts("a").is_empty());
        assert_eq!(summary.entities().len(), 1);
    }

    #[test]
    fn test_render_follows_rank_then_fact_order() {
        let sapa = Entity::new(
            "sapa_trek",
            "Sapa Trekking",
            EntityCategory::Activity,
            "Multi-day trek through rice terraces",
        );
        let lao_cai = entity("lao_cai_province", "Lao Cai Province", EntityCategory::Region);
        let ha_long = entity("ha_long_bay", "Ha Long Bay", EntityCategory::Location);

        let mut expansions = HashMap::new();
        expansions.insert(
            "sapa_trek".to_string(),
            Expansion {
                neighbors: vec![lao_cai],
                relations: vec![Relation::new("sapa_trek", "RELATED_TO", "lao_cai_province")],
            },
        );
        expansions.insert("ha_long_bay".to_string(), Expansion::default());

        let summary = synthesize(
            vec![ScoredEntity::new(ha_long, 0.85), ScoredEntity::new(sapa, 0.91)],
            expansions,
        )
        .unwrap();
        let text = summary.render(&RenderOptions::default());

        let sapa_at = text.find("Sapa Trekking").unwrap();
        let rel_at = text.find("RELATED_TO").unwrap();
        let lao_at = text.find("Lao Cai Province").unwrap();
        let ha_long_at = text.find("Ha Long Bay").unwrap();
        assert!(sapa_at < rel_at && rel_at < lao_at && lao_at < ha_long_at);
        assert!(text.starts_with(
            "1. Sapa Trekking (activity, score 0.91): Multi-day trek through rice terraces\n"
        ));
        assert!(text.contains("   - -[RELATED_TO]-> Lao Cai Province (region)\n"));
    }

    #[test]
    fn test_render_incoming_relation_and_properties() {
        let mut expansions = HashMap::new();
        expansions.insert(
            "hue".to_string(),
            Expansion {
                neighbors: vec![entity("da_nang", "Da Nang", EntityCategory::Location)],
                relations: vec![Relation::new("da_nang", "CONNECTED_TO", "hue")
                    .with_properties(serde_json::json!({"distance_km": 95, "mode": "train"}))],
            },
        );
        let summary = synthesize(vec![hit("hue", "Hue", 0.7)], expansions).unwrap();
        let text = summary.render(&RenderOptions::default());
        assert!(text.contains("<-[CONNECTED_TO]- Da Nang (location) [distance_km=95, mode=train]"));
    }

    #[test]
    fn test_render_kept_marks_omitted_facts() {
        let mut expansions = HashMap::new();
        expansions.insert(
            "a".to_string(),
            Expansion {
                neighbors: vec![
                    entity("x", "X", EntityCategory::Region),
                    entity("y", "Y", EntityCategory::Region),
                    entity("z", "Z", EntityCategory::Region),
                ],
                relations: vec![
                    Relation::new("a", "R", "x"),
                    Relation::new("a", "R", "y"),
                    Relation::new("a", "R", "z"),
                ],
            },
        );
        let summary = synthesize(vec![hit("a", "A", 0.5)], expansions).unwrap();
        let text = summary.render_kept(&[1], &RenderOptions::default());
        assert!(text.contains("X (region)"));
        assert!(!text.contains("Y (region)"));
        assert!(text.contains("(2 more related facts omitted)"));
    }

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate_preview("short", 80), "short");
        assert_eq!(
            truncate_preview("a".repeat(100).as_str(), 80),
            format!("{}...", "a".repeat(80))
        );
        assert_eq!(truncate_preview("Đà Lạt city", 5), "Đà Lạ...");
    }
}
