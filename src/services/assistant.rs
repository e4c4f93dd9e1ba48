//! Assistant chat: the Dyann transcript, replies, export and import.
//!
//! DESIGN
//! ======
//! One transcript per process, reset when the session ends. Replies come
//! from the generative model when one is configured; if it is missing or the
//! call fails, a keyword-matched canned reply is used so the chat never
//! dead-ends. Imports are validated in full before anything is replaced.

use serde::{Deserialize, Deserializer, Serialize, de};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::llm::TextGenerator;

use super::now_ms;

pub const GREETING: &str = "Hello! I'm Dyann AI, your sales data assistant. I can help you analyze your sales data, \
                            answer questions, and provide insights. How can I help you today?";

/// Messages of history included in a model prompt.
const PROMPT_HISTORY: usize = 10;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn speaker(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Dyann",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), role, content: content.into(), timestamp: now_ms() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("Error importing chat file: {0}")]
    InvalidImport(String),
}

impl ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "E_EMPTY_MESSAGE",
            Self::InvalidImport(_) => "E_INVALID_IMPORT",
        }
    }
}

/// Portable form of one message, as written by export and read by import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    #[serde(deserialize_with = "timestamp_ms")]
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub role: Role,
    pub content: String,
}

/// Milliseconds since the epoch, as export writes them, or an RFC 3339 string
/// such as `2024-01-02T03:04:05.678Z`.
fn timestamp_ms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => Ok(ms),
        Raw::Text(text) => {
            let at = OffsetDateTime::parse(text.trim(), &Rfc3339)
                .map_err(|e| de::Error::custom(format!("timestamp '{text}': {e}")))?;
            i64::try_from(at.unix_timestamp_nanos() / 1_000_000).map_err(de::Error::custom)
        }
    }
}

// =============================================================================
// TRANSCRIPT
// =============================================================================

#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// A fresh transcript holding only the greeting.
    #[must_use]
    pub fn new() -> Self {
        Self { messages: vec![ChatMessage::new(Role::Assistant, GREETING)] }
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Trim and append a user message. Returns the stored message.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyMessage`] for blank input.
    pub fn push_user(&mut self, input: &str) -> Result<ChatMessage, ChatError> {
        let content = input.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let message = ChatMessage::new(Role::User, content);
        self.messages.push(message.clone());
        Ok(message)
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> ChatMessage {
        let message = ChatMessage::new(Role::Assistant, content);
        self.messages.push(message.clone());
        message
    }

    #[must_use]
    pub fn export(&self) -> Vec<ExportEntry> {
        self.messages
            .iter()
            .map(|m| ExportEntry { timestamp: m.timestamp, role: m.role, content: m.content.clone() })
            .collect()
    }

    /// Replace the transcript with an exported one.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidImport`] if the file is not an array of
    /// entries, is empty, or any entry is blank or has a negative timestamp.
    /// The transcript is left untouched on error.
    pub fn import(&mut self, raw: &str) -> Result<usize, ChatError> {
        let entries: Vec<ExportEntry> =
            serde_json::from_str(raw).map_err(|e| ChatError::InvalidImport(e.to_string()))?;
        if entries.is_empty() {
            return Err(ChatError::InvalidImport("no messages".into()));
        }
        if let Some(pos) = entries.iter().position(|e| e.content.trim().is_empty() || e.timestamp < 0) {
            return Err(ChatError::InvalidImport(format!("entry {pos} is invalid")));
        }

        self.messages = entries
            .into_iter()
            .map(|e| ChatMessage { id: Uuid::new_v4(), role: e.role, content: e.content, timestamp: e.timestamp })
            .collect();
        Ok(self.messages.len())
    }
}

// =============================================================================
// REPLIES
// =============================================================================

/// Canned reply chosen by keywords in the user's message.
#[must_use]
pub fn keyword_reply(input: &str) -> &'static str {
    let input = input.to_lowercase();
    let has = |word: &str| input.contains(word);

    if has("sales") && has("trend") {
        "Based on your recent sales data, I can see a positive upward trend. Sales have increased by 12.5% \
         compared to last month, with electronics being your top-performing category at 35% of total sales."
    } else if has("customer") || has("feedback") {
        "Your customer satisfaction is excellent! The average rating is 4.6/5.0, with 78% of customers giving \
         4 or 5-star reviews. Most feedback mentions product quality and fast delivery as key strengths."
    } else if has("revenue") || has("profit") {
        "Your total revenue this month is $28,000, which represents a 15% increase from last month. The profit \
         margin is approximately 32%, with electronics and clothing categories contributing the most to your \
         bottom line."
    } else if has("forecast") || has("prediction") {
        "Based on current trends and seasonal patterns, I predict your sales will continue growing by 8-12% in \
         the next quarter. The holiday season should boost electronics sales by 20-25%."
    } else {
        "I'd be happy to help you analyze your sales data! You can ask me about sales trends, customer feedback, \
         revenue analysis, or request forecasts. What specific aspect would you like to explore?"
    }
}

/// Reply to the last user message in `history`.
///
/// `context` is a JSON rendering of the current dashboard figures.
pub async fn reply(llm: Option<&dyn TextGenerator>, history: &[ChatMessage], context: &str) -> String {
    let Some(last) = history.last() else {
        return keyword_reply("").to_owned();
    };
    let Some(llm) = llm else {
        return keyword_reply(&last.content).to_owned();
    };

    match llm.generate(&chat_prompt(history, context)).await {
        Ok(text) => text.trim().to_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "assistant generation failed; using canned reply");
            keyword_reply(&last.content).to_owned()
        }
    }
}

fn chat_prompt(history: &[ChatMessage], context: &str) -> String {
    let recent = &history[history.len().saturating_sub(PROMPT_HISTORY)..];
    let mut prompt = String::from(
        "You are Dyann AI, a friendly sales data assistant. Answer the user's last message in a few \
         sentences, using the dashboard figures below when they are relevant.\n\nDashboard figures:\n",
    );
    prompt.push_str(context);
    prompt.push_str("\n\nConversation:\n");
    for message in recent {
        prompt.push_str(message.role.speaker());
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt.push_str("Dyann:");
    prompt
}

#[cfg(test)]
#[path = "assistant_test.rs"]
mod tests;
