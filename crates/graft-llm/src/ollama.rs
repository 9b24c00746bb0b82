//! Ollama LLM provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use graft_core::error::{GraftError, GraftResult};
use graft_core::traits::{
    GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat, TokenUsage,
};
use graft_core::types::{Message, MessageRole};

const OLLAMA_API_URL: &str = "http://localhost:11434";

/// Ollama LLM provider for locally served models.
pub struct OllamaLlm {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

impl OllamaLlm {
    /// Create a new Ollama LLM provider. No credential required.
    pub fn new(config: LlmConfig) -> GraftResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| OLLAMA_API_URL.to_string());

        url::Url::parse(&base_url)
            .map_err(|e| GraftError::Configuration(format!("Invalid Ollama URL: {}", e)))?;

        let client = Client::new();

        let mut config = config;
        if config.model.is_empty() {
            config.model = "llama3.1".to_string();
        }

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Llm for OllamaLlm {
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> GraftResult<LlmResponse> {
        let options = options.unwrap_or_default();

        let ollama_messages = messages
            .iter()
            .map(|m| OllamaMessage {
                role: match m.role {
                    MessageRole::System => "system".to_string(),
                    MessageRole::User => "user".to_string(),
                    MessageRole::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        let format = matches!(options.response_format, Some(ResponseFormat::Json))
            .then(|| "json".to_string());

        let request = OllamaRequest {
            model: self.config.model.clone(),
            messages: ollama_messages,
            stream: false,
            format,
            options: OllamaOptions {
                temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
                num_predict: Some(options.max_tokens.unwrap_or(self.config.max_tokens)),
                num_ctx: options.num_ctx,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| GraftError::network(format!("Ollama API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GraftError::network(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(GraftError::from_http_status(status.as_u16(), &body));
        }

        let response: OllamaResponse = serde_json::from_str(&body)
            .map_err(|e| GraftError::llm_invalid_response(format!("Failed to parse response: {}", e)))?;

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (None, None) => None,
            (prompt, completion) => {
                let prompt = prompt.unwrap_or(0);
                let completion = completion.unwrap_or(0);
                Some(TokenUsage {
                    prompt_tokens: prompt,
                    completion_tokens: completion,
                    total_tokens: prompt + completion,
                })
            }
        };

        Ok(LlmResponse {
            content: response.message.map(|m| m.content),
            usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        // Ollama accepts a structured format hint.
        true
    }
}
