//! Extraction orchestration.
//!
//! [`KnowledgeExtractor`] drives one extraction call end to end: build
//! a domain-aware prompt, acquire a rate permit, invoke the provider
//! with bounded exponential backoff on transient faults, parse the
//! response through the resilient cascade, and decode it into an
//! [`ExtractionResult`]. When no provider is configured or transient
//! retries are exhausted, it falls back to deterministic pattern-based
//! extraction; fatal provider faults surface immediately.

pub mod fallback;
pub mod prompt;

use std::sync::Arc;

use serde_json::Value;

use crate::config::{GraftConfig, LlmProvider, RetryPolicy};
use crate::error::{GraftError, GraftResult};
use crate::limiter::RateLimiter;
use crate::parser;
use crate::parser::schema::{filter_placeholders, is_placeholder, RecordSchema};
use crate::traits::{GenerationOptions, Llm, LlmResponse, ResponseFormat};
use crate::types::{Entity, ExtractionResult, ParseStrategy, Relationship, SourceStrategy};

pub use prompt::{PromptBuilder, PromptOptions, Strictness};

/// Orchestrates extraction calls against an optional provider, with
/// the pattern fallback behind it.
pub struct KnowledgeExtractor {
    llm: Option<Arc<dyn Llm>>,
    provider: LlmProvider,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    estimated_tokens: u64,
    max_tokens: u32,
    prompt_options: PromptOptions,
}

impl KnowledgeExtractor {
    /// Create an extractor. `llm == None` means fallback-only.
    pub fn new(
        config: &GraftConfig,
        llm: Option<Arc<dyn Llm>>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let provider = config
            .llm
            .as_ref()
            .map(|l| l.provider)
            .unwrap_or_default();
        let max_tokens = config
            .llm
            .as_ref()
            .map(|l| l.config.max_tokens)
            .unwrap_or(2000);
        Self {
            llm,
            provider,
            limiter,
            retry: config.retry,
            estimated_tokens: config.rate_limit.estimated_tokens_per_request,
            max_tokens,
            prompt_options: PromptOptions::default(),
        }
    }

    /// Override prompt options (schema fields, strictness).
    pub fn with_prompt_options(mut self, options: PromptOptions) -> Self {
        self.prompt_options = options;
        self
    }

    /// Extract entities and relationships from text.
    ///
    /// Always returns a result (possibly low-confidence fallback),
    /// except for empty input and fatal provider faults.
    pub async fn extract(&self, text: &str, domain: &str) -> GraftResult<ExtractionResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GraftError::empty_input("no text to extract from"));
        }

        let Some(llm) = self.llm.clone() else {
            tracing::debug!(domain, "no provider configured, using pattern fallback");
            return Ok(fallback::extract(text, domain));
        };

        match self.extract_with_provider(&*llm, text, domain).await {
            Ok(result) => Ok(result),
            Err(err) if err.is_transient() => {
                tracing::warn!(
                    domain,
                    error = %err,
                    "provider attempts exhausted, using pattern fallback"
                );
                Ok(fallback::extract(text, domain))
            }
            // Auth and invalid-request faults are not papered over.
            Err(err) => Err(err),
        }
    }

    async fn extract_with_provider(
        &self,
        llm: &dyn Llm,
        text: &str,
        domain: &str,
    ) -> GraftResult<ExtractionResult> {
        let mut options = self.prompt_options.clone();
        options.domain = domain.to_string();
        let (system, user) = PromptBuilder::new(options).build(text);
        let messages = [system, user];

        let permit = self
            .limiter
            .acquire_or_wait(self.provider, self.estimated_tokens, self.retry.max_retries)
            .await?;

        let generation = GenerationOptions {
            // Deterministic for extraction.
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            response_format: Some(ResponseFormat::Json),
            ..Default::default()
        };

        let response = self.generate_with_retry(llm, &messages, generation).await?;

        let actual_tokens = response
            .usage
            .map(|u| u64::from(u.total_tokens))
            .unwrap_or(self.estimated_tokens);
        permit.commit(actual_tokens);

        let content = response.content_or_empty();
        let (value, strategy) = parser::parse(content)?;
        Ok(decode(value, strategy, domain))
    }

    async fn generate_with_retry(
        &self,
        llm: &dyn Llm,
        messages: &[crate::types::Message],
        generation: GenerationOptions,
    ) -> GraftResult<LlmResponse> {
        let mut attempt = 0;
        loop {
            let outcome = match llm.generate(messages, Some(generation.clone())).await {
                Ok(response) if response.content_or_empty().trim().is_empty() => Err(
                    GraftError::llm_invalid_response("provider returned empty content"),
                ),
                other => other,
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Decode a parsed record into an extraction result.
fn decode(value: Value, strategy: ParseStrategy, domain: &str) -> ExtractionResult {
    let envelope = RecordSchema::extraction().repair_keys(value);
    let mut result = ExtractionResult::empty(domain, SourceStrategy::LlmParse(strategy));

    if let Some(items) = envelope.get("entities").and_then(Value::as_array) {
        for item in items {
            if let Some(entity) = decode_entity(item) {
                result.entities.push(entity);
            }
        }
    }

    if let Some(items) = envelope.get("relationships").and_then(Value::as_array) {
        for item in items {
            if let Some(rel) = decode_relationship(item) {
                result.relationships.push(rel);
            }
        }
    }

    result
}

fn decode_entity(item: &Value) -> Option<Entity> {
    let repaired = RecordSchema::entity().repair_keys(item.clone());
    let obj = repaired.as_object()?;

    let label = obj
        .get("label")
        .and_then(Value::as_str)
        .or_else(|| obj.get("id").and_then(Value::as_str))?
        .trim();
    if label.is_empty() {
        return None;
    }

    // The type tag is kept verbatim: "Unknown" is meaningful to the
    // graph's placeholder rules and must not be filtered away here.
    let entity_type = obj
        .get("type")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("Entity");

    let mut entity = Entity::new(label, entity_type);

    // Placeholder filtering applies to attribute maps only.
    if let Some(attrs) = obj.get("attributes") {
        let filtered = filter_placeholders(attrs.clone());
        if let Some(map) = filtered.as_object() {
            for (key, value) in map {
                entity.attributes.insert(key.clone(), value_to_string(value));
            }
        }
    }
    // Extra keys the model volunteered become attributes too.
    for (key, value) in obj {
        if matches!(key.as_str(), "id" | "label" | "type" | "attributes") {
            continue;
        }
        if is_placeholder(value) {
            continue;
        }
        entity.attributes.insert(key.clone(), value_to_string(value));
    }

    Some(entity)
}

fn decode_relationship(item: &Value) -> Option<Relationship> {
    let repaired = RecordSchema::relationship().repair_keys(item.clone());
    let obj = repaired.as_object()?;

    let source = obj.get("source").and_then(Value::as_str)?.trim();
    let target = obj.get("target").and_then(Value::as_str)?.trim();
    if source.is_empty() || target.is_empty() {
        return None;
    }

    let relation = obj
        .get("relation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("related_to");

    Some(Relationship::new(source, target, relation))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::config::{LlmProviderConfig, RateLimitConfig};
    use crate::types::{Confidence, Message};

    enum Script {
        Content(&'static str),
        Transient,
        Fatal,
    }

    struct MockLlm {
        script: Mutex<VecDeque<Script>>,
        calls: Mutex<u32>,
    }

    impl MockLlm {
        fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Llm for MockLlm {
        async fn generate(
            &self,
            _messages: &[Message],
            _options: Option<GenerationOptions>,
        ) -> GraftResult<LlmResponse> {
            *self.calls.lock().unwrap() += 1;
            match self.script.lock().unwrap().pop_front() {
                Some(Script::Content(content)) => Ok(LlmResponse {
                    content: Some(content.to_string()),
                    usage: None,
                }),
                Some(Script::Transient) | None => Err(GraftError::network("connection reset")),
                Some(Script::Fatal) => Err(GraftError::authentication("invalid api key")),
            }
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn config() -> GraftConfig {
        GraftConfig {
            llm: Some(LlmProviderConfig::default()),
            retry: RetryPolicy {
                max_retries: 2,
                initial_delay_ms: 1,
                max_delay_ms: 5,
                multiplier: 2.0,
            },
            rate_limit: RateLimitConfig::default(),
            ..Default::default()
        }
    }

    fn extractor(llm: Option<Arc<dyn Llm>>) -> KnowledgeExtractor {
        let cfg = config();
        let limiter = Arc::new(RateLimiter::new(cfg.rate_limit));
        KnowledgeExtractor::new(&cfg, llm, limiter)
    }

    #[tokio::test]
    async fn test_code_fence_response_yields_one_entity() {
        let llm = MockLlm::new(vec![Script::Content(
            "```json\n{\"entities\": [{\"id\": \"a\", \"label\": \"A\", \"type\": \"X\"}], \"relationships\": []}\n```",
        )]);
        let extractor = extractor(Some(llm as Arc<dyn Llm>));

        let result = extractor.extract("some text", "general").await.unwrap();
        assert_eq!(result.entity_count(), 1);
        assert_eq!(result.entities[0].label, "A");
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(
            result.source_strategy,
            SourceStrategy::LlmParse(ParseStrategy::CodeFence)
        );
    }

    #[tokio::test]
    async fn test_transient_exhaustion_falls_back_with_low_confidence() {
        let llm = MockLlm::new(vec![Script::Transient, Script::Transient, Script::Transient]);
        let calls_handle = llm.clone();
        let extractor = extractor(Some(llm as Arc<dyn Llm>));

        let result = extractor
            .extract("Django is a framework written in Python.", "technology")
            .await
            .unwrap();

        // Initial attempt + 2 retries.
        assert_eq!(calls_handle.calls(), 3);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.source_strategy, SourceStrategy::PatternFallback);
        assert!(result.entities.iter().any(|e| e.label == "Django"));
    }

    #[tokio::test]
    async fn test_transient_then_success_keeps_high_confidence() {
        let llm = MockLlm::new(vec![
            Script::Transient,
            Script::Content(r#"{"entities": [{"label": "Python", "type": "Language"}], "relationships": []}"#),
        ]);
        let extractor = extractor(Some(llm as Arc<dyn Llm>));

        let result = extractor.extract("Python.", "technology").await.unwrap();
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(
            result.source_strategy,
            SourceStrategy::LlmParse(ParseStrategy::Direct)
        );
    }

    #[tokio::test]
    async fn test_fatal_error_surfaces_immediately() {
        let llm = MockLlm::new(vec![Script::Fatal]);
        let calls_handle = llm.clone();
        let extractor = extractor(Some(llm as Arc<dyn Llm>));

        let err = extractor.extract("text", "general").await.unwrap_err();
        assert!(matches!(err, GraftError::Authentication { .. }));
        assert_eq!(calls_handle.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_provider_uses_fallback() {
        let extractor = extractor(None);
        let result = extractor
            .extract("Python is a programming language.", "technology")
            .await
            .unwrap();
        assert_eq!(result.source_strategy, SourceStrategy::PatternFallback);
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let extractor = extractor(None);
        assert!(extractor.extract("   ", "general").await.is_err());
    }

    #[test]
    fn test_decode_repairs_misnamed_fields() {
        let value = serde_json::json!({
            "nodes": [{"name": "Alice", "entity_type": "Person", "role": "engineer"}],
            "relations": [{"from": "Alice", "to": "Acme", "predicate": "works_at"}]
        });
        let result = decode(value, ParseStrategy::Direct, "general");

        assert_eq!(result.entity_count(), 1);
        assert_eq!(result.entities[0].label, "Alice");
        assert_eq!(result.entities[0].entity_type, "Person");
        assert_eq!(
            result.entities[0].attributes.get("role").map(String::as_str),
            Some("engineer")
        );
        assert_eq!(result.relationship_count(), 1);
        assert_eq!(result.relationships[0].relation, "works_at");
    }

    #[test]
    fn test_decode_filters_placeholder_attributes() {
        let value = serde_json::json!({
            "entities": [{"label": "Python", "type": "Language", "creator": "N/A", "year": "1991"}],
            "relationships": []
        });
        let result = decode(value, ParseStrategy::Direct, "general");
        let entity = &result.entities[0];
        assert!(entity.attributes.get("creator").is_none());
        assert_eq!(entity.attributes.get("year").map(String::as_str), Some("1991"));
    }

    #[test]
    fn test_decode_keeps_model_supplied_unknown_type() {
        let value = serde_json::json!({
            "entities": [
                {"label": "Mystery", "type": "Unknown"},
                {"label": "Riddle", "type": "unknown", "hint": "n/a"}
            ],
            "relationships": []
        });
        let result = decode(value, ParseStrategy::Direct, "general");

        // The type tag is not subject to placeholder filtering.
        assert_eq!(result.entities[0].entity_type, "Unknown");
        assert_eq!(result.entities[1].entity_type, "unknown");
        // Attribute placeholders still are.
        assert!(result.entities[1].attributes.get("hint").is_none());
    }

    #[test]
    fn test_decode_skips_invalid_records() {
        let value = serde_json::json!({
            "entities": [{"label": "Valid", "type": "X"}, {"type": "X"}, {"label": "  "}],
            "relationships": [{"source": "a"}, {"source": "a", "target": "b"}]
        });
        let result = decode(value, ParseStrategy::Direct, "general");
        assert_eq!(result.entity_count(), 1);
        assert_eq!(result.relationship_count(), 1);
        assert_eq!(result.relationships[0].relation, "related_to");
    }
}
