//! Auth routes: sign-in, sign-up, sign-out, and the session event stream.

use std::convert::Infallible;

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::ApiError;
use crate::error::ErrorCode;
use crate::session::{AuthAction, AuthError, Session};
use crate::state::AppState;

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// The current session. Use as a handler parameter to require sign-in.
pub struct SignedIn(pub Session);

impl<S> axum::extract::FromRequestParts<S> for SignedIn
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(_parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        AppState::from_ref(state)
            .session
            .current()
            .map(Self)
            .ok_or_else(ApiError::unauthorized)
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Deserialize)]
pub struct CredentialsBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SessionView {
    pub signed_in: bool,
    pub session: Option<Session>,
}

impl SessionView {
    fn of(session: Option<Session>) -> Self {
        Self { signed_in: session.is_some(), session }
    }
}

fn auth_error_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::InvalidInput(_) | AuthError::Unknown(_) => StatusCode::BAD_REQUEST,
        AuthError::AuthInProgress => StatusCode::CONFLICT,
        AuthError::NetworkUnavailable | AuthError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Same body shape as every other error, with the action-specific message.
fn auth_failure(err: &AuthError, action: AuthAction) -> ApiError {
    ApiError {
        status: auth_error_status(err),
        code: err.error_code(),
        message: err.user_message(action),
        retryable: err.retryable(),
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /api/auth/session`: who is signed in, if anyone.
pub async fn session(State(state): State<AppState>) -> Json<SessionView> {
    Json(SessionView::of(state.session.current()))
}

/// `POST /api/auth/sign-in`
pub async fn sign_in(State(state): State<AppState>, Json(body): Json<CredentialsBody>) -> Result<Json<Session>, ApiError> {
    state
        .session
        .sign_in(&body.email, &body.password)
        .await
        .map(Json)
        .map_err(|e| auth_failure(&e, AuthAction::SignIn))
}

/// `POST /api/auth/sign-up`: create the account and sign in as it.
pub async fn sign_up(State(state): State<AppState>, Json(body): Json<CredentialsBody>) -> Result<Json<Session>, ApiError> {
    state
        .session
        .sign_up(&body.email, &body.password)
        .await
        .map(Json)
        .map_err(|e| auth_failure(&e, AuthAction::SignUp))
}

/// `POST /api/auth/sign-out`: always succeeds, signed in or not.
pub async fn sign_out(State(state): State<AppState>) -> StatusCode {
    state.session.sign_out().await;
    StatusCode::NO_CONTENT
}

/// `GET /api/auth/events`
///
/// Server-sent events carrying the current session, then every transition.
pub async fn events(State(state): State<AppState>) -> Response {
    Sse::new(session_events(&state))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn session_events(state: &AppState) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let (tx, rx) = mpsc::unbounded_channel();
    // Subscribe before reading so no transition falls between the two.
    let subscription = state.session.subscribe(move |next| {
        let _ = tx.send(next.cloned());
    });
    let initial = state.session.current();

    let changes = futures::stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        rx.recv().await.map(|next| (next, (rx, subscription)))
    });

    futures::stream::once(async move { initial })
        .chain(changes)
        .map(|session| Ok(session_event(session)))
        .take_until(state.shutdown.clone().cancelled_owned())
}

fn session_event(session: Option<Session>) -> Event {
    let view = SessionView::of(session);
    Event::default()
        .event("session")
        .data(serde_json::to_string(&view).unwrap_or_default())
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
