//! Assistant routes: the operator's chat transcript.
//!
//! The transcript lock is never held across the model call: the user message
//! is appended, the history copied out, and the reply appended afterwards
//! only if the transcript still holds that user message (a sign-out or an
//! import in between discards the late reply).

use std::sync::PoisonError;

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use super::ApiError;
use super::auth::SignedIn;
use crate::services::assistant::{self, ChatError, ChatMessage, ExportEntry};
use crate::state::AppState;

const EXPORT_FILE_NAME: &str = "dyann-chat-history.json";

fn chat_error(err: &ChatError) -> ApiError {
    ApiError::from_error(StatusCode::BAD_REQUEST, err)
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SendMessage {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Exchange {
    pub user: ChatMessage,
    /// `None` when the transcript was reset while the reply was generated.
    pub reply: Option<ChatMessage>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Imported {
    pub imported: usize,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /api/assistant/messages`
pub async fn list_messages(_auth: SignedIn, State(state): State<AppState>) -> Json<Vec<ChatMessage>> {
    let chat = state.chat.lock().unwrap_or_else(PoisonError::into_inner);
    Json(chat.messages().to_vec())
}

/// `POST /api/assistant/messages`
pub async fn send_message(
    _auth: SignedIn,
    State(state): State<AppState>,
    Json(body): Json<SendMessage>,
) -> Result<Json<Exchange>, ApiError> {
    let (user, history) = {
        let mut chat = state.chat.lock().unwrap_or_else(PoisonError::into_inner);
        let user = chat.push_user(&body.message).map_err(|e| chat_error(&e))?;
        (user, chat.messages().to_vec())
    };

    let context = serde_json::to_string_pretty(&state.dashboard().metrics).unwrap_or_default();
    let text = assistant::reply(state.llm(), &history, &context).await;

    let mut chat = state.chat.lock().unwrap_or_else(PoisonError::into_inner);
    let reply = if chat.messages().iter().any(|m| m.id == user.id) {
        Some(chat.push_assistant(text))
    } else {
        tracing::info!("transcript changed during reply; discarding it");
        None
    };
    Ok(Json(Exchange { user, reply }))
}

/// `GET /api/assistant/export`
///
/// The transcript as a downloadable JSON file.
pub async fn export_chat(_auth: SignedIn, State(state): State<AppState>) -> Response {
    let entries: Vec<ExportEntry> = state.chat.lock().unwrap_or_else(PoisonError::into_inner).export();
    let disposition = format!("attachment; filename=\"{EXPORT_FILE_NAME}\"");
    let body = serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".into());
    ([(CONTENT_TYPE, "application/json".to_owned()), (CONTENT_DISPOSITION, disposition)], body).into_response()
}

/// `POST /api/assistant/import`
///
/// Replace the transcript with an exported file.
pub async fn import_chat(_auth: SignedIn, State(state): State<AppState>, body: String) -> Result<Json<Imported>, ApiError> {
    let mut chat = state.chat.lock().unwrap_or_else(PoisonError::into_inner);
    let imported = chat.import(&body).map_err(|e| {
        tracing::warn!(error = %e, "chat import rejected");
        chat_error(&e)
    })?;
    tracing::info!(imported, "chat history imported");
    Ok(Json(Imported { imported }))
}

#[cfg(test)]
#[path = "assistant_test.rs"]
mod tests;
