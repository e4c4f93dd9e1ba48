//! LLM: generative-text adapter for the AI features.
//!
//! DESIGN
//! ======
//! Services depend on the [`TextGenerator`] trait only. The concrete client
//! talks to Gemini and is configured from environment variables; when no key
//! is configured the AI features report "not configured" and the assistant
//! falls back to canned replies.

pub mod config;
pub mod gemini;
pub mod types;

use config::LlmConfig;
pub use gemini::GeminiClient;
pub use types::{LlmError, TextGenerator};

/// Build the generative-text client from environment variables.
///
/// # Errors
///
/// Returns an error if the API key is missing or the HTTP client fails.
pub fn client_from_env() -> Result<GeminiClient, LlmError> {
    let config = LlmConfig::from_env()?;
    GeminiClient::new(config)
}
