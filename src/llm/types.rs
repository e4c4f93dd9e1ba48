//! LLM types: the generative-text boundary and its errors.

use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by generative-text client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The required API key environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The HTTP request to the provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The provider answered without any text (e.g. blocked by safety filters).
    #[error("API response contained no text")]
    EmptyResponse,

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::MissingApiKey { .. } => "E_MISSING_API_KEY",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::EmptyResponse => "E_EMPTY_RESPONSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::EmptyResponse | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// TEXT GENERATION TRAIT
// =============================================================================

/// Prompt in, free text out. Enables mocking in tests.
///
/// The text is whatever the model produced: callers that expect JSON must
/// handle anything else themselves.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request fails or the response carries no text.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
