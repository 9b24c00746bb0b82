//! graft-core - Core library for graft.
//!
//! This crate provides the resilient parser cascade, rate-limited
//! extraction orchestration, knowledge-graph merge engine, and batch
//! enrichment pipeline for building knowledge graphs from unstructured
//! text.
//!
//! # Example
//!
//! ```ignore
//! use graft_core::{BatchPipeline, GraftConfig, KnowledgeExtractor, KnowledgeGraph, RateLimiter};
//! use std::sync::Arc;
//!
//! let config = GraftConfig::from_env();
//! let limiter = Arc::new(RateLimiter::new(config.rate_limit));
//! let extractor = KnowledgeExtractor::new(&config, llm, limiter);
//!
//! // Extract and merge
//! let result = extractor.extract("Python is a programming language.", "technology").await?;
//! let graph = KnowledgeGraph::new();
//! graph.merge(&result);
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod limiter;
pub mod parser;
pub mod pipeline;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{GraftConfig, LlmProvider, LlmProviderConfig, RateLimitConfig, RetryPolicy};
pub use error::{ErrorCode, GraftError, GraftResult};
pub use extract::{KnowledgeExtractor, PromptBuilder, PromptOptions, Strictness};
pub use graph::{GraphDocument, GraphStats, KnowledgeGraph, MergeOutcome};
pub use limiter::{Acquire, Permit, RateLimiter};
pub use pipeline::{BatchPipeline, CheckpointStore, ItemStatus, RunSummary, WorkItem};
pub use traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat, TokenUsage};
pub use types::{
    derive_entity_id, Confidence, Entity, ExtractionResult, Message, MessageRole, ParseStrategy,
    Relationship, SourceStrategy, UNKNOWN_TYPE,
};
