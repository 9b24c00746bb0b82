//! Deterministic pattern-based extraction.
//!
//! Used when no provider is configured or all provider attempts are
//! exhausted. Recognizes capitalized multi-word spans as entity
//! candidates and a fixed set of linking phrases between adjacent
//! spans as relationship candidates. Never calls out and never fails:
//! text with no recognizable spans yields an empty result.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{
    derive_entity_id, Entity, ExtractionResult, Relationship, SourceStrategy,
};

static CAPITALIZED_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\b").unwrap());

/// Linking phrases and the relation label each one emits. Checked in
/// order; when several match the text between two spans, the one
/// closest to the second span wins.
const LINK_PATTERNS: &[(&str, &str)] = &[
    (r"\bwritten\s+in\b", "written_in"),
    (r"\bdeveloped\s+by\b", "developed_by"),
    (r"\bcreated\s+by\b", "created_by"),
    (r"\bdepends\s+on\b", "depends_on"),
    (r"\bbased\s+(?:in|on)\b", "based_in"),
    (r"\bworks\s+(?:at|for)\b", "works_at"),
    (r"\bpart\s+of\b", "part_of"),
    (r"\bis\s+an?\b", "is_a"),
    (r"\buses\b", "uses"),
    (r"\bhas\b", "has"),
];

static LINKS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    LINK_PATTERNS
        .iter()
        .map(|(pattern, label)| (Regex::new(pattern).unwrap(), *label))
        .collect()
});

/// Sentence-initial words that the capitalized-span heuristic would
/// otherwise misread as entities.
const SPAN_STOPWORDS: &[&str] = &[
    "The", "A", "An", "This", "That", "These", "Those", "It", "In", "On", "At", "If", "But",
    "And", "Or", "For", "With", "When", "While", "There", "Here",
];

/// Extract entities and relationships from text without a provider.
pub fn extract(text: &str, domain: &str) -> ExtractionResult {
    let mut result = ExtractionResult::empty(domain, SourceStrategy::PatternFallback);

    // Recognized spans in text order, with byte offsets for gap analysis.
    let mut spans: Vec<(usize, usize, &str)> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for m in CAPITALIZED_SPAN.find_iter(text) {
        let span = m.as_str();
        if span.len() < 2 || SPAN_STOPWORDS.contains(&span) {
            continue;
        }
        spans.push((m.start(), m.end(), span));
        if seen.insert(derive_entity_id(span)) {
            result.entities.push(Entity::new(span, "Entity"));
        }
    }

    // Relationships between adjacent spans within one sentence.
    let mut emitted = std::collections::HashSet::new();
    for pair in spans.windows(2) {
        let (_, end_a, label_a) = pair[0];
        let (start_b, _, label_b) = pair[1];
        let gap = &text[end_a..start_b];
        if gap.contains(['.', '!', '?', ';']) {
            continue;
        }
        if let Some(relation) = match_link(gap) {
            let rel = Relationship::new(
                derive_entity_id(label_a),
                derive_entity_id(label_b),
                relation,
            );
            if emitted.insert(rel.clone()) {
                result.relationships.push(rel);
            }
        }
    }

    result
}

/// Find the linking phrase in a gap between two spans. When several
/// phrases occur, the last occurrence (nearest the target span) wins.
fn match_link(gap: &str) -> Option<&'static str> {
    let mut best: Option<(usize, &'static str)> = None;
    for (regex, label) in LINKS.iter() {
        if let Some(m) = regex.find_iter(gap).last() {
            if best.map_or(true, |(start, _)| m.start() > start) {
                best = Some((m.start(), label));
            }
        }
    }
    best.map(|(_, label)| label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Confidence;

    #[test]
    fn test_python_django_scenario() {
        let text =
            "Python is a programming language. Django is a web framework written in Python.";
        let result = extract(text, "technology");

        let labels: Vec<&str> = result.entities.iter().map(|e| e.label.as_str()).collect();
        assert!(labels.contains(&"Python"));
        assert!(labels.contains(&"Django"));
        assert!(result.entities.iter().all(|e| e.entity_type == "Entity"));

        assert!(result.relationships.iter().any(|r| {
            r.source == "django" && r.target == "python" && r.relation == "written_in"
        }));
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.source_strategy, SourceStrategy::PatternFallback);
    }

    #[test]
    fn test_no_spans_yields_empty_result_not_error() {
        let result = extract("nothing capitalized here at all.", "general");
        assert!(result.is_empty());
    }

    #[test]
    fn test_stopwords_are_not_entities() {
        let result = extract("The tool is useful. This helps.", "general");
        assert!(result.entities.is_empty());
    }

    #[test]
    fn test_no_relationship_across_sentence_boundary() {
        let result = extract("Rust has tooling. Cargo is nice.", "technology");
        // "Rust" and "Cargo" are in different sentences; "has" must not
        // link them.
        assert!(result
            .relationships
            .iter()
            .all(|r| !(r.source == "rust" && r.target == "cargo")));
    }

    #[test]
    fn test_uses_pattern() {
        let result = extract("Netflix uses Cassandra for storage.", "technology");
        assert!(result
            .relationships
            .iter()
            .any(|r| r.source == "netflix" && r.target == "cassandra" && r.relation == "uses"));
    }

    #[test]
    fn test_duplicate_spans_deduplicated() {
        let result = extract("Python is great. Python is popular.", "general");
        let count = result.entities.iter().filter(|e| e.label == "Python").count();
        assert_eq!(count, 1);
    }
}
