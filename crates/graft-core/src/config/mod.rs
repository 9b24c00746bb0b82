//! Configuration system for graft.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::traits::LlmConfig;

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Anthropic,
    Ollama,
}

impl LlmProvider {
    /// Stable name used for rate-budget bookkeeping and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Ollama => "ollama",
        }
    }
}

/// Provider configuration with type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider type.
    pub provider: LlmProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: LlmConfig,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            config: LlmConfig {
                model: "gpt-4o-mini".to_string(),
                ..Default::default()
            },
        }
    }
}

/// Per-provider call ceilings for the rate limiter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed in any trailing 60 seconds.
    pub requests_per_minute: u32,
    /// Tokens allowed in any trailing 60 seconds.
    pub tokens_per_minute: u64,
    /// Tokens allowed in any trailing 24 hours.
    pub tokens_per_day: u64,
    /// Estimated tokens reserved per call before actual usage is known.
    pub estimated_tokens_per_request: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            tokens_per_minute: 1_000_000,
            tokens_per_day: 10_000_000,
            estimated_tokens_per_request: 2000,
        }
    }
}

/// Retry policy for transient provider faults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the initial call.
    pub max_retries: u32,
    /// Initial delay before the first retry (milliseconds).
    pub initial_delay_ms: u64,
    /// Maximum delay between retries (milliseconds).
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before the given retry attempt (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f64 * f64::from(self.multiplier).powi(attempt as i32);
        Duration::from_millis((delay as u64).min(self.max_delay_ms))
    }
}

/// Main graft configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraftConfig {
    /// LLM configuration. `None` means fallback-only extraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmProviderConfig>,
    /// Rate ceilings applied to the configured provider.
    pub rate_limit: RateLimitConfig,
    /// Retry policy for transient provider faults.
    pub retry: RetryPolicy,
    /// Default extraction domain.
    pub default_domain: String,
}

impl Default for GraftConfig {
    fn default() -> Self {
        Self {
            llm: None,
            rate_limit: RateLimitConfig::default(),
            retry: RetryPolicy::default(),
            default_domain: "general".to_string(),
        }
    }
}

impl GraftConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::error::GraftResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| crate::error::GraftError::Configuration(e.to_string())),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| crate::error::GraftError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| crate::error::GraftError::Configuration(e.to_string())),
            _ => Err(crate::error::GraftError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads a `.env` file first if one is present. With no provider
    /// API key configured the extractor runs fallback-only.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        let provider = std::env::var("GRAFT_LLM_PROVIDER")
            .ok()
            .map(|p| match p.to_lowercase().as_str() {
                "anthropic" => LlmProvider::Anthropic,
                "ollama" => LlmProvider::Ollama,
                _ => LlmProvider::OpenAI,
            })
            .unwrap_or_default();

        let api_key = match provider {
            LlmProvider::OpenAI => std::env::var("OPENAI_API_KEY").ok(),
            LlmProvider::Anthropic => std::env::var("ANTHROPIC_API_KEY").ok(),
            // Ollama serves locally and needs no credential.
            LlmProvider::Ollama => Some(String::new()),
        };

        if let Some(api_key) = api_key {
            let mut llm = LlmProviderConfig {
                provider,
                ..Default::default()
            };
            if !api_key.is_empty() {
                llm.config.api_key = Some(api_key);
            }
            if let Ok(model) = std::env::var("GRAFT_LLM_MODEL") {
                llm.config.model = model;
            }
            config.llm = Some(llm);
        }

        if let Ok(domain) = std::env::var("GRAFT_DEFAULT_DOMAIN") {
            config.default_domain = domain;
        }

        config
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> GraftConfigBuilder {
        GraftConfigBuilder::default()
    }
}

/// Builder for GraftConfig.
#[derive(Default)]
pub struct GraftConfigBuilder {
    config: GraftConfig,
}

impl GraftConfigBuilder {
    /// Set LLM configuration.
    pub fn llm(mut self, config: LlmProviderConfig) -> Self {
        self.config.llm = Some(config);
        self
    }

    /// Set rate limit ceilings.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.config.rate_limit = config;
        self
    }

    /// Set retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set default extraction domain.
    pub fn default_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.default_domain = domain.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GraftConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_fallback_only() {
        let config = GraftConfig::default();
        assert!(config.llm.is_none());
        assert_eq!(config.default_domain, "general");
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 350,
            multiplier: 2.0,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        // Capped at max_delay_ms.
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(10), Duration::from_millis(350));
    }

    #[test]
    fn test_builder() {
        let config = GraftConfig::builder()
            .default_domain("technology")
            .rate_limit(RateLimitConfig {
                requests_per_minute: 3,
                ..Default::default()
            })
            .build();
        assert_eq!(config.default_domain, "technology");
        assert_eq!(config.rate_limit.requests_per_minute, 3);
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = GraftConfig {
            llm: Some(LlmProviderConfig::default()),
            ..Default::default()
        };
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: GraftConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.llm.unwrap().provider, LlmProvider::OpenAI);
    }
}
