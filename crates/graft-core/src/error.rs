//! Error types for graft operations.
//!
//! This module provides the error hierarchy with structured error codes,
//! suggestions for resolution, and the transient/fatal split that drives
//! retry behavior in the extraction orchestrator.

use thiserror::Error;

/// Result type alias for graft operations.
pub type GraftResult<T> = Result<T, GraftError>;

/// Main error type for all graft operations.
#[derive(Error, Debug)]
pub enum GraftError {
    /// Authentication failed. Never retried.
    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        code: ErrorCode,
    },

    /// Input validation failed (e.g. empty text handed to extract).
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        suggestion: Option<String>,
    },

    /// Local rate budget exhausted. The caller should wait and retry.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        code: ErrorCode,
        /// Suggested wait before retrying, in milliseconds.
        retry_after_ms: Option<u64>,
    },

    /// LLM call failed (provider-side fault or malformed response).
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network-level failure reaching a provider.
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Parse failure from the resilient parser's terminal strategy.
    /// Only raised for empty or non-text input.
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        code: ErrorCode,
    },

    /// Configuration error (missing credentials, bad config file).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider not supported by the factory.
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication (AUTH_xxx)
    AuthInvalidKey,
    AuthMissingCredentials,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValEmptyInput,

    // Rate Limit (RATE_xxx)
    RateRequestsPerMinute,
    RateTokensPerMinute,
    RateTokensPerDay,

    // LLM (LLM_xxx)
    LlmConnectionFailed,
    LlmGenerationFailed,
    LlmInvalidResponse,
    LlmInvalidRequest,

    // Network (NET_xxx)
    NetTimeout,
    NetConnectionFailed,

    // Parse (PARSE_xxx)
    ParseEmptyInput,
    ParseInvalidJson,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthInvalidKey => "AUTH_001",
            ErrorCode::AuthMissingCredentials => "AUTH_002",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValEmptyInput => "VAL_002",
            ErrorCode::RateRequestsPerMinute => "RATE_001",
            ErrorCode::RateTokensPerMinute => "RATE_002",
            ErrorCode::RateTokensPerDay => "RATE_003",
            ErrorCode::LlmConnectionFailed => "LLM_001",
            ErrorCode::LlmGenerationFailed => "LLM_002",
            ErrorCode::LlmInvalidResponse => "LLM_003",
            ErrorCode::LlmInvalidRequest => "LLM_004",
            ErrorCode::NetTimeout => "NET_001",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::ParseEmptyInput => "PARSE_001",
            ErrorCode::ParseInvalidJson => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl GraftError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            suggestion: None,
        }
    }

    /// Create a validation error for empty input.
    pub fn empty_input(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValEmptyInput,
            suggestion: Some("Provide non-empty text to extract from".to_string()),
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmGenerationFailed,
            source: None,
        }
    }

    /// Create an LLM error for a malformed response.
    pub fn llm_invalid_response(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmInvalidResponse,
            source: None,
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetConnectionFailed,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            code: ErrorCode::AuthInvalidKey,
        }
    }

    /// Create a rate limit error with a suggested wait.
    pub fn rate_limit(message: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        Self::RateLimit {
            message: message.into(),
            code: ErrorCode::RateRequestsPerMinute,
            retry_after_ms,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::RateLimit { code, .. } => *code,
            Self::Llm { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error is worth retrying with backoff.
    ///
    /// Network faults, provider-reported rate limits, and generation
    /// failures are transient. Authentication, validation, and
    /// configuration faults are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimit { .. } => true,
            Self::Llm { code, .. } => !matches!(code, ErrorCode::LlmInvalidRequest),
            _ => false,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Authentication { .. } => {
                Some("Please check your API key and authentication credentials")
            }
            Self::RateLimit { .. } => Some("Please wait before making more requests"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Llm { .. } => Some("Please check your LLM provider configuration"),
            Self::Network { .. } => Some("Please check your network connection and provider endpoint"),
            _ => None,
        }
    }

    /// Convert from an HTTP status code returned by a provider.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            400 | 422 => Self::Llm {
                message: format!("Invalid request ({}): {}", status, body),
                code: ErrorCode::LlmInvalidRequest,
                source: None,
            },
            401 | 403 => Self::Authentication {
                message: body.to_string(),
                code: ErrorCode::AuthInvalidKey,
            },
            408 => Self::Network {
                message: body.to_string(),
                code: ErrorCode::NetTimeout,
                source: None,
            },
            429 => Self::RateLimit {
                message: body.to_string(),
                code: ErrorCode::RateRequestsPerMinute,
                retry_after_ms: None,
            },
            500..=599 => Self::Llm {
                message: format!("Provider error ({}): {}", status, body),
                code: ErrorCode::LlmGenerationFailed,
                source: None,
            },
            _ => Self::Internal(format!("HTTP {}: {}", status, body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = GraftError::validation("Invalid input");
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
        assert!(err.to_string().contains("Invalid input"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(GraftError::network("timed out").is_transient());
        assert!(GraftError::rate_limit("over budget", Some(500)).is_transient());
        assert!(GraftError::llm("upstream 500").is_transient());
        assert!(!GraftError::authentication("bad key").is_transient());
        assert!(!GraftError::Configuration("no key".into()).is_transient());
    }

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            GraftError::from_http_status(401, "unauthorized"),
            GraftError::Authentication { .. }
        ));
        assert!(matches!(
            GraftError::from_http_status(429, "slow down"),
            GraftError::RateLimit { .. }
        ));
        assert!(GraftError::from_http_status(503, "overloaded").is_transient());
        // Permanently invalid requests are not retryable.
        assert!(!GraftError::from_http_status(400, "bad param").is_transient());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::AuthInvalidKey.as_str(), "AUTH_001");
        assert_eq!(ErrorCode::ParseEmptyInput.as_str(), "PARSE_001");
    }
}
