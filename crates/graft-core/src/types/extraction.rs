//! Extraction result types.

use serde::{Deserialize, Serialize};

use super::entity::{Entity, Relationship};

/// Nominal confidence of an extraction result.
///
/// A structured LLM parse is always `High`; the pattern fallback is
/// always `Low`. The tag reflects the path that actually produced the
/// result, never an inherited marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    High,
}

/// The parsing strategy that produced a structured record from raw
/// model output. Ordered by cascade position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    /// Direct structural parse of the full text.
    Direct,
    /// Markdown code-fence delimiters stripped first.
    CodeFence,
    /// Largest bracket-delimited block scanned out of prose.
    BracketScan,
    /// Heuristic repair (quotes, trailing commas, bare keys).
    Repair,
    /// Line-oriented key-value extraction. Terminal fallback.
    LineScan,
}

/// Which extraction path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStrategy {
    /// A provider call whose output was parsed with the given strategy.
    LlmParse(ParseStrategy),
    /// Deterministic pattern-based fallback; no provider involved.
    PatternFallback,
}

/// Result of one extraction call. Produced once, consumed exactly once
/// by a graph merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Candidate entities, in extraction order.
    pub entities: Vec<Entity>,
    /// Candidate relationships, in extraction order.
    pub relationships: Vec<Relationship>,
    /// Domain the extraction was performed under.
    pub domain: String,
    /// The path that produced this result.
    pub source_strategy: SourceStrategy,
    /// Nominal confidence.
    pub confidence: Confidence,
}

impl ExtractionResult {
    /// Create an empty result for the given domain and strategy.
    pub fn empty(domain: impl Into<String>, source_strategy: SourceStrategy) -> Self {
        let confidence = match source_strategy {
            SourceStrategy::LlmParse(_) => Confidence::High,
            SourceStrategy::PatternFallback => Confidence::Low,
        };
        Self {
            entities: Vec::new(),
            relationships: Vec::new(),
            domain: domain.into(),
            source_strategy,
            confidence,
        }
    }

    /// Check if the result contains nothing.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    /// Get entity count.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Get relationship count.
    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }
}
