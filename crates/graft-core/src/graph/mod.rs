//! The persistent knowledge graph and its merge engine.
//!
//! Backed by a petgraph `DiGraph` plus an id index and a relationship
//! triple set, all behind a single mutex so concurrent merges
//! serialize: two merges can never both observe "entity absent" and
//! both insert.
//!
//! Identity rules:
//! - An entity's id derives from its normalized label. Merging an
//!   entity whose id already exists unions attribute maps, with the
//!   incoming value winning on key conflict and never deleting
//!   previously recorded keys.
//! - A relationship's identity is its `(source, target, relation)`
//!   triple; duplicate triples merge idempotently. Endpoints that do
//!   not resolve are created as "Unknown"-typed placeholders, later
//!   promotable when a concretely typed record arrives.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::error::GraftResult;
use crate::types::{derive_entity_id, Entity, ExtractionResult, Relationship, UNKNOWN_TYPE};

/// Counts of what a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Entities inserted as new nodes.
    pub entities_added: usize,
    /// Existing entities whose attributes or type were unioned.
    pub entities_updated: usize,
    /// Relationships inserted (duplicates not counted).
    pub relationships_added: usize,
    /// Placeholder endpoints created for early relationships.
    pub placeholders_created: usize,
}

/// Summary statistics over the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relationship_count: usize,
    /// Entity count per type tag.
    pub entity_types: BTreeMap<String, usize>,
    /// Relationship count per relation label.
    pub relation_types: BTreeMap<String, usize>,
    /// Mean (in + out) degree across entities.
    pub avg_degree: f64,
}

/// Serialized graph form: same shape as an extraction result, with an
/// optional statistics block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<GraphStats>,
}

#[derive(Debug, Default)]
struct GraphInner {
    graph: DiGraph<Entity, String>,
    id_index: HashMap<String, NodeIndex>,
    triples: HashSet<Relationship>,
}

impl GraphInner {
    /// Insert or union one entity. Returns (node, was_new, was_updated).
    fn upsert_entity(&mut self, incoming: Entity) -> (NodeIndex, bool, bool) {
        let id = if incoming.id.is_empty() {
            derive_entity_id(&incoming.label)
        } else {
            derive_entity_id(&incoming.id)
        };

        if let Some(&node) = self.id_index.get(&id) {
            let existing = &mut self.graph[node];
            let mut updated = false;

            // Type union: incoming wins, but a placeholder never
            // downgrades a concrete type.
            if incoming.entity_type != UNKNOWN_TYPE
                && existing.entity_type != incoming.entity_type
            {
                existing.entity_type = incoming.entity_type;
                updated = true;
            }

            // Attribute union: incoming overrides on conflict, existing
            // keys are never removed.
            for (key, value) in incoming.attributes {
                let replaced = existing.attributes.insert(key, value.clone());
                if replaced.as_ref() != Some(&value) {
                    updated = true;
                }
            }

            (node, false, updated)
        } else {
            let entity = Entity {
                id: id.clone(),
                ..incoming
            };
            let node = self.graph.add_node(entity);
            self.id_index.insert(id, node);
            (node, true, false)
        }
    }

    /// Resolve a relationship endpoint, creating a placeholder when it
    /// does not exist yet. Returns (node, placeholder_created).
    fn resolve_endpoint(&mut self, reference: &str) -> (NodeIndex, bool) {
        let id = derive_entity_id(reference);
        if let Some(&node) = self.id_index.get(&id) {
            return (node, false);
        }
        let (node, _, _) = self.upsert_entity(Entity::placeholder(reference.trim()));
        (node, true)
    }

    fn insert_relationship(&mut self, rel: &Relationship) -> (bool, usize) {
        let (source, s_created) = self.resolve_endpoint(&rel.source);
        let (target, t_created) = self.resolve_endpoint(&rel.target);
        let placeholders = usize::from(s_created) + usize::from(t_created);

        let canonical = Relationship::new(
            self.graph[source].id.clone(),
            self.graph[target].id.clone(),
            rel.relation.clone(),
        );
        if self.triples.contains(&canonical) {
            return (false, placeholders);
        }

        self.graph.add_edge(source, target, canonical.relation.clone());
        self.triples.insert(canonical);
        (true, placeholders)
    }
}

/// The knowledge graph. Owns all entity and relationship records; no
/// other component mutates them.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    inner: Mutex<GraphInner>,
}

impl KnowledgeGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an extraction result. Idempotent: merging the same result
    /// twice leaves the graph identical to merging it once.
    pub fn merge(&self, result: &ExtractionResult) -> MergeOutcome {
        let mut inner = self.inner.lock().expect("graph lock poisoned");
        let mut outcome = MergeOutcome::default();

        for entity in &result.entities {
            if entity.label.trim().is_empty() && entity.id.trim().is_empty() {
                continue;
            }
            let (_, added, updated) = inner.upsert_entity(entity.clone());
            if added {
                outcome.entities_added += 1;
            } else if updated {
                outcome.entities_updated += 1;
            }
        }

        for rel in &result.relationships {
            if rel.source.trim().is_empty() || rel.target.trim().is_empty() {
                continue;
            }
            let (added, placeholders) = inner.insert_relationship(rel);
            if added {
                outcome.relationships_added += 1;
            }
            outcome.placeholders_created += placeholders;
        }

        tracing::debug!(
            entities_added = outcome.entities_added,
            relationships_added = outcome.relationships_added,
            placeholders = outcome.placeholders_created,
            domain = %result.domain,
            "merged extraction result"
        );

        outcome
    }

    /// Number of entities.
    pub fn entity_count(&self) -> usize {
        self.inner.lock().expect("graph lock poisoned").graph.node_count()
    }

    /// Number of relationships.
    pub fn relationship_count(&self) -> usize {
        self.inner.lock().expect("graph lock poisoned").graph.edge_count()
    }

    /// Whether the graph holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }

    /// Look up an entity by id (normalized before lookup).
    pub fn entity(&self, id: &str) -> Option<Entity> {
        let inner = self.inner.lock().expect("graph lock poisoned");
        let node = *inner.id_index.get(&derive_entity_id(id))?;
        Some(inner.graph[node].clone())
    }

    /// All entities in insertion order.
    pub fn entities(&self) -> Vec<Entity> {
        let inner = self.inner.lock().expect("graph lock poisoned");
        inner
            .graph
            .node_indices()
            .map(|n| inner.graph[n].clone())
            .collect()
    }

    /// All relationships.
    pub fn relationships(&self) -> Vec<Relationship> {
        let inner = self.inner.lock().expect("graph lock poisoned");
        inner
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (source, target) = inner.graph.edge_endpoints(e)?;
                Some(Relationship::new(
                    inner.graph[source].id.clone(),
                    inner.graph[target].id.clone(),
                    inner.graph[e].clone(),
                ))
            })
            .collect()
    }

    /// Compute summary statistics.
    pub fn stats(&self) -> GraphStats {
        let inner = self.inner.lock().expect("graph lock poisoned");
        let entity_count = inner.graph.node_count();
        let relationship_count = inner.graph.edge_count();

        let mut entity_types = BTreeMap::new();
        for node in inner.graph.node_indices() {
            *entity_types
                .entry(inner.graph[node].entity_type.clone())
                .or_insert(0) += 1;
        }

        let mut relation_types = BTreeMap::new();
        for edge in inner.graph.edge_indices() {
            *relation_types.entry(inner.graph[edge].clone()).or_insert(0) += 1;
        }

        let avg_degree = if entity_count == 0 {
            0.0
        } else {
            // Each edge contributes one out- and one in-degree.
            (relationship_count * 2) as f64 / entity_count as f64
        };

        GraphStats {
            entity_count,
            relationship_count,
            entity_types,
            relation_types,
            avg_degree,
        }
    }

    /// Serialize to the persisted document form. Entity insertion
    /// order is preserved for deterministic output.
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            entities: self.entities(),
            relationships: self.relationships(),
            stats: Some(self.stats()),
        }
    }

    /// Rebuild a graph from its persisted form.
    pub fn from_document(document: &GraphDocument) -> Self {
        let graph = Self::new();
        {
            let mut inner = graph.inner.lock().expect("graph lock poisoned");
            for entity in &document.entities {
                inner.upsert_entity(entity.clone());
            }
            for rel in &document.relationships {
                inner.insert_relationship(rel);
            }
        }
        graph
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> GraftResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Load from the JSON document form.
    pub fn from_json(json: &str) -> GraftResult<Self> {
        let document: GraphDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(&document))
    }

    /// Remove everything.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("graph lock poisoned");
        inner.graph.clear();
        inner.id_index.clear();
        inner.triples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, SourceStrategy};

    fn result_with(entities: Vec<Entity>, relationships: Vec<Relationship>) -> ExtractionResult {
        ExtractionResult {
            entities,
            relationships,
            domain: "technology".to_string(),
            source_strategy: SourceStrategy::PatternFallback,
            confidence: Confidence::Low,
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let graph = KnowledgeGraph::new();
        let result = result_with(
            vec![
                Entity::new("Python", "Language"),
                Entity::new("Django", "Framework"),
            ],
            vec![Relationship::new("django", "python", "written_in")],
        );

        graph.merge(&result);
        let entities_once = graph.entity_count();
        let rels_once = graph.relationship_count();

        graph.merge(&result);
        assert_eq!(graph.entity_count(), entities_once);
        assert_eq!(graph.relationship_count(), rels_once);
    }

    #[test]
    fn test_concurrent_merges_of_same_result_equal_one_merge() {
        let graph = std::sync::Arc::new(KnowledgeGraph::new());
        let result = std::sync::Arc::new(result_with(
            vec![
                Entity::new("Python", "Language"),
                Entity::new("Django", "Framework"),
            ],
            vec![Relationship::new("django", "python", "written_in")],
        ));

        // Merges serialize on the graph mutex: no two can both observe
        // an entity absent and both insert it.
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let graph = std::sync::Arc::clone(&graph);
                let result = std::sync::Arc::clone(&result);
                std::thread::spawn(move || {
                    graph.merge(&result);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(graph.entity_count(), 2);
        assert_eq!(graph.relationship_count(), 1);
    }

    #[test]
    fn test_merge_unions_attributes_incoming_wins() {
        let graph = KnowledgeGraph::new();
        graph.merge(&result_with(
            vec![Entity::new("Python", "Language")
                .with_attribute("paradigm", "imperative")
                .with_attribute("year", "1991")],
            vec![],
        ));
        graph.merge(&result_with(
            vec![Entity::new("python", "Language").with_attribute("paradigm", "multi-paradigm")],
            vec![],
        ));

        let entity = graph.entity("python").unwrap();
        // Incoming wins on conflict; existing keys are never deleted.
        assert_eq!(
            entity.attributes.get("paradigm").map(String::as_str),
            Some("multi-paradigm")
        );
        assert_eq!(entity.attributes.get("year").map(String::as_str), Some("1991"));
        assert_eq!(graph.entity_count(), 1);
    }

    #[test]
    fn test_early_relationship_creates_placeholders() {
        let graph = KnowledgeGraph::new();
        let result = result_with(vec![], vec![Relationship::new("x", "y", "uses")]);

        let outcome = graph.merge(&result);
        assert_eq!(outcome.placeholders_created, 2);
        assert_eq!(graph.entity_count(), 2);
        assert_eq!(graph.relationship_count(), 1);
        assert_eq!(graph.entity("x").unwrap().entity_type, UNKNOWN_TYPE);

        // Identical triple again: nothing changes.
        let outcome = graph.merge(&result);
        assert_eq!(outcome.relationships_added, 0);
        assert_eq!(graph.entity_count(), 2);
        assert_eq!(graph.relationship_count(), 1);
    }

    #[test]
    fn test_placeholder_promoted_by_later_entity() {
        let graph = KnowledgeGraph::new();
        graph.merge(&result_with(
            vec![],
            vec![Relationship::new("Rust", "LLVM", "compiles_with")],
        ));
        assert_eq!(graph.entity("rust").unwrap().entity_type, UNKNOWN_TYPE);

        graph.merge(&result_with(vec![Entity::new("Rust", "Language")], vec![]));
        assert_eq!(graph.entity("rust").unwrap().entity_type, "Language");
        assert_eq!(graph.entity_count(), 2);
    }

    #[test]
    fn test_placeholder_never_downgrades_concrete_type() {
        let graph = KnowledgeGraph::new();
        graph.merge(&result_with(vec![Entity::new("Rust", "Language")], vec![]));
        graph.merge(&result_with(
            vec![],
            vec![Relationship::new("Rust", "Cargo", "ships_with")],
        ));
        assert_eq!(graph.entity("rust").unwrap().entity_type, "Language");
    }

    #[test]
    fn test_parallel_relations_coexist_between_same_pair() {
        let graph = KnowledgeGraph::new();
        graph.merge(&result_with(
            vec![],
            vec![
                Relationship::new("a", "b", "uses"),
                Relationship::new("a", "b", "depends_on"),
            ],
        ));
        assert_eq!(graph.relationship_count(), 2);
    }

    #[test]
    fn test_roundtrip_preserves_entities_and_relationships() {
        let graph = KnowledgeGraph::new();
        graph.merge(&result_with(
            vec![
                Entity::new("Python", "Language").with_attribute("typing", "dynamic"),
                Entity::new("Django", "Framework"),
            ],
            vec![Relationship::new("django", "python", "written_in")],
        ));

        let json = graph.to_json().unwrap();
        let restored = KnowledgeGraph::from_json(&json).unwrap();

        assert_eq!(restored.entities(), graph.entities());
        assert_eq!(restored.relationships(), graph.relationships());
    }

    #[test]
    fn test_stats_breakdown() {
        let graph = KnowledgeGraph::new();
        graph.merge(&result_with(
            vec![
                Entity::new("Python", "Language"),
                Entity::new("Rust", "Language"),
                Entity::new("Django", "Framework"),
            ],
            vec![Relationship::new("django", "python", "written_in")],
        ));

        let stats = graph.stats();
        assert_eq!(stats.entity_count, 3);
        assert_eq!(stats.relationship_count, 1);
        assert_eq!(stats.entity_types.get("Language"), Some(&2));
        assert_eq!(stats.entity_types.get("Framework"), Some(&1));
        assert_eq!(stats.relation_types.get("written_in"), Some(&1));
    }

    #[test]
    fn test_clear() {
        let graph = KnowledgeGraph::new();
        graph.merge(&result_with(vec![Entity::new("Python", "Language")], vec![]));
        graph.clear();
        assert!(graph.is_empty());
        assert_eq!(graph.relationship_count(), 0);
    }
}
