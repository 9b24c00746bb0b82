//! Trait seams between the core and provider backends.

mod llm;

pub use llm::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat, TokenUsage};
