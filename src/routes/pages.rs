//! Page routes: every navigation goes through the router guard.

use axum::extract::State;
use axum::http::Uri;
use axum::response::{IntoResponse, Json, Redirect, Response};

use super::ApiError;
use crate::router::{self, Navigation};
use crate::shell;
use crate::state::AppState;

/// `GET /`, `/login`, `/dyann`, `/dashboard`, `/assistant`, `/reviews`.
///
/// Redirects are `303 See Other`; honored paths answer with the page frame.
pub async fn page(State(state): State<AppState>, uri: Uri) -> Response {
    let session = state.session.current();
    match router::guard(session.is_some(), uri.path()) {
        Navigation::Redirect(to) => {
            tracing::debug!(from = uri.path(), to, "navigation redirected");
            Redirect::to(to).into_response()
        }
        Navigation::Honor(path) => match router::find(path) {
            Some(route) => Json(shell::page_view(route, session.as_ref())).into_response(),
            None => ApiError::not_found().into_response(),
        },
    }
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod tests;
