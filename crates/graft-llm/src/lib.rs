//! graft-llm - LLM provider implementations for graft.
//!
//! This crate provides LLM provider implementations for use with the
//! graft knowledge-graph extraction pipeline.
//!
//! # Supported Providers
//!
//! - **OpenAI** - GPT-4o, GPT-4.1, o-series reasoning models
//! - **Anthropic** - Claude 3.5, Claude 3, etc.
//! - **Ollama** - Local models via Ollama
//!
//! # Example
//!
//! ```ignore
//! use graft_llm::LlmFactory;
//!
//! // Create an OpenAI LLM
//! let llm = LlmFactory::openai()?;
//!
//! // Or with a specific model
//! let llm = LlmFactory::openai_with_model("gpt-4o-mini")?;
//!
//! // Create an Ollama LLM (no credential needed)
//! let llm = LlmFactory::ollama_with_model("llama3.1")?;
//! ```

mod anthropic;
mod factory;
mod ollama;
mod openai;

pub use anthropic::AnthropicLlm;
pub use factory::LlmFactory;
pub use ollama::OllamaLlm;
pub use openai::OpenAILlm;

// Re-export core types for convenience
pub use graft_core::config::LlmProvider;
pub use graft_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat};
