//! Gemini `generateContent` client.
//!
//! Thin HTTP wrapper for `/models/{model}:generateContent`. Pure parsing in
//! `parse_response` for testability.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{LlmConfig, LlmTimeouts};
use super::types::{LlmError, TextGenerator};

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// # Errors
    ///
    /// Returns [`LlmError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let LlmTimeouts { request_secs, connect_secs } = config.timeouts;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_secs))
            .connect_timeout(Duration::from_secs(connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key: config.api_key, model: config.model, base_url: config.base_url })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait::async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = ApiRequest { contents: [RequestContent { parts: [RequestPart { text: prompt }] }] };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        if status != 200 {
            return Err(LlmError::ApiResponse { status, body: text });
        }

        let parsed = parse_response(&text)?;
        tracing::debug!(
            model = %self.model,
            prompt_tokens = parsed.prompt_tokens,
            output_tokens = parsed.output_tokens,
            "gemini generation complete"
        );
        Ok(parsed.text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct ApiRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(Debug)]
pub(crate) struct Generation {
    pub text: String,
    pub prompt_tokens: u64,
    pub output_tokens: u64,
}

/// Concatenate the text parts of the first candidate.
pub(crate) fn parse_response(json: &str) -> Result<Generation, LlmError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| LlmError::ApiParse(e.to_string()))?;

    let text: String = api
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let (prompt_tokens, output_tokens) = api
        .usage_metadata
        .map_or((0, 0), |u| (u.prompt_token_count, u.candidates_token_count));

    Ok(Generation { text, prompt_tokens, output_tokens })
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
