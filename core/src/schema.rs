//! Schema snapshot and tool catalog types supplied by the runtime.
//!
//! Both are fetched once per optimization run and treated as read-only for
//! the rest of it, so the action space the search explores stays stable.

use serde::{Deserialize, Serialize};

/// Inventory of queryable entity and relationship types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Entity (vertex label) names
    pub entities: Vec<String>,
    /// Relationship (edge type) names
    pub relations: Vec<String>,
}

impl SchemaSnapshot {
    /// Create a snapshot from entity and relation names.
    #[must_use]
    pub fn new<E, R>(entities: E, relations: R) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            entities: entities.into_iter().map(Into::into).collect(),
            relations: relations.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the snapshot has nothing to bind templates to.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() || self.relations.is_empty()
    }

    /// All schema terms, lowercased, for lexical matching.
    #[must_use]
    pub fn terms(&self) -> Vec<String> {
        self.entities
            .iter()
            .chain(self.relations.iter())
            .map(|term| term.to_lowercase())
            .collect()
    }
}

/// A tool the runtime can invoke, with capability tags used for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool identifier
    pub id: String,
    /// Capability tags (e.g. "query", "analysis")
    pub capability_tags: Vec<String>,
    /// Human-readable description
    pub description: String,
}

impl ToolDescriptor {
    /// Create a tool descriptor.
    #[must_use]
    pub fn new<T>(id: impl Into<String>, tags: T, description: impl Into<String>) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            id: id.into(),
            capability_tags: tags.into_iter().map(Into::into).collect(),
            description: description.into(),
        }
    }

    /// Lowercased text searched by keyword rankers.
    #[must_use]
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.id,
            self.description,
            self.capability_tags.join(" ")
        )
        .to_lowercase()
    }
}
