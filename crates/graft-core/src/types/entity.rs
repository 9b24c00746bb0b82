//! Entity and relationship types for the knowledge graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Type tag given to placeholder entities created when a relationship
/// arrives before its endpoints.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// A node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identity, derived from the normalized label.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Open type tag, e.g. "Language", "Person".
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Domain-defined attributes. BTreeMap keeps serialization deterministic.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Entity {
    /// Create a new entity with a derived id.
    pub fn new(label: impl Into<String>, entity_type: impl Into<String>) -> Self {
        let label = label.into();
        let entity_type = entity_type.into();
        Self {
            id: derive_entity_id(&label),
            label,
            entity_type,
            attributes: BTreeMap::new(),
        }
    }

    /// Create a placeholder entity for an unresolved relationship endpoint.
    pub fn placeholder(label: impl Into<String>) -> Self {
        Self::new(label, UNKNOWN_TYPE)
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether this entity is an unresolved placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.entity_type == UNKNOWN_TYPE
    }
}

/// Derive a stable, case-insensitive entity id from a label.
///
/// Two mentions of "Python" and "python" resolve to the same node.
pub fn derive_entity_id(label: &str) -> String {
    let normalized: String = label
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    normalized
}

/// A directed, labeled edge between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    /// Source entity id.
    pub source: String,
    /// Target entity id.
    pub target: String,
    /// Relation label, e.g. "written_in".
    pub relation: String,
}

impl Relationship {
    /// Create a new relationship.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
        }
    }

    /// The identity triple of this relationship.
    pub fn triple(&self) -> (&str, &str, &str) {
        (&self.source, &self.target, &self.relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_entity_id_case_insensitive() {
        assert_eq!(derive_entity_id("Python"), derive_entity_id("python"));
        assert_eq!(derive_entity_id("  Machine   Learning "), "machine_learning");
    }

    #[test]
    fn test_entity_builder() {
        let entity = Entity::new("Django", "Framework").with_attribute("language", "Python");
        assert_eq!(entity.id, "django");
        assert_eq!(entity.entity_type, "Framework");
        assert_eq!(entity.attributes.get("language").map(String::as_str), Some("Python"));
        assert!(!entity.is_placeholder());
    }

    #[test]
    fn test_placeholder_entity() {
        let entity = Entity::placeholder("mystery");
        assert!(entity.is_placeholder());
        assert_eq!(entity.entity_type, UNKNOWN_TYPE);
    }

    #[test]
    fn test_relationship_triple() {
        let rel = Relationship::new("django", "python", "written_in");
        assert_eq!(rel.triple(), ("django", "python", "written_in"));
    }
}
