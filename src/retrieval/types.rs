//! Core retrieval type definitions.
//!
//! Defines [`Entity`] (a location, activity or region shared by the vector and graph
//! stores), [`ScoredEntity`] (a vector-search hit), [`Relation`] (a directed graph
//! edge) and [`Expansion`] (the first-degree neighborhood of one entity).

use serde::{Deserialize, Serialize};

/// Category of a travel entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    /// A city, attraction, hotel or other concrete place.
    Location,
    /// Something to do: a trek, a cruise, a cooking class.
    Activity,
    /// A province or area that contains locations.
    Region,
}

impl EntityCategory {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Activity => "activity",
            Self::Region => "region",
        }
    }
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "location" => Ok(Self::Location),
            "activity" => Ok(Self::Activity),
            "region" => Ok(Self::Region),
            _ => Err(format!("unknown entity category: {s}")),
        }
    }
}

/// A travel location or activity record.
///
/// `id` is the join key between vector-search hits and graph nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub category: EntityCategory,
    /// Free text that was embedded into the vector index.
    pub description: String,
}

impl Entity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: EntityCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: description.into(),
        }
    }
}

/// An entity returned by vector search, with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntity {
    pub entity: Entity,
    /// Cosine similarity to the query, higher is closer.
    pub score: f32,
}

impl ScoredEntity {
    pub fn new(entity: Entity, score: f32) -> Self {
        Self { entity, score }
    }
}

/// A directed typed edge between two entities. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source_id: String,
    pub target_id: String,
    /// Relationship label (e.g. `"IS_LOCATED_IN"`, `"RELATED_TO"`, `"HAS_ACTIVITY"`).
    pub relation_type: String,
    /// Optional edge properties such as `{"distance_km": 38}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl Relation {
    pub fn new(
        source_id: impl Into<String>,
        relation_type: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type: relation_type.into(),
            properties: None,
        }
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = Some(properties);
        self
    }

    /// The endpoint opposite `id`, or `None` if `id` is not an endpoint.
    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.source_id == id {
            Some(&self.target_id)
        } else if self.target_id == id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

/// First-degree neighborhood of one entity, in graph-client order.
///
/// An entity without relationships has an empty expansion; that is not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expansion {
    pub neighbors: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl Expansion {
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}
