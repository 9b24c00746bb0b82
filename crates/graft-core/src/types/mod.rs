//! Core types for graft.

mod entity;
mod extraction;
mod message;

pub use entity::{derive_entity_id, Entity, Relationship, UNKNOWN_TYPE};
pub use extraction::{Confidence, ExtractionResult, ParseStrategy, SourceStrategy};
pub use message::{Message, MessageRole};
