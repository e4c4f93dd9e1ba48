//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the guarded page routes and the JSON API under a single
//! Axum router. Page routes answer with a `PageView` or a `303 See Other`
//! redirect chosen by the router guard; API routes answer with JSON and
//! render every failure as `{ "code", "message", "retryable" }`.

pub mod assistant;
pub mod auth;
pub mod dashboard;
pub mod pages;
pub mod reviews;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ErrorCode;
use crate::state::AppState;

/// Largest accepted CSV upload.
const UPLOAD_LIMIT_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// ERROR BODY
// =============================================================================

/// JSON error response with an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    /// Render a domain error with the given status.
    pub fn from_error<E: ErrorCode>(status: StatusCode, err: &E) -> Self {
        Self { status, code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "E_UNAUTHORIZED",
            message: "sign in to continue".into(),
            retryable: false,
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self { status: StatusCode::NOT_FOUND, code: "E_NOT_FOUND", message: "not found".into(), retryable: false }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { code: self.code, message: &self.message, retryable: self.retryable };
        (self.status, Json(body)).into_response()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(pages::page))
        .route("/login", get(pages::page))
        .route("/dyann", get(pages::page))
        .route("/dashboard", get(pages::page))
        .route("/assistant", get(pages::page))
        .route("/reviews", get(pages::page))
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/sign-in", post(auth::sign_in))
        .route("/api/auth/sign-up", post(auth::sign_up))
        .route("/api/auth/sign-out", post(auth::sign_out))
        .route("/api/auth/events", get(auth::events))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route("/api/dashboard/suggestions", post(dashboard::suggestions))
        .route("/api/dashboard/chart-recommendations", post(dashboard::chart_recommendations))
        .route("/api/dashboard/insights", post(dashboard::insights))
        .route("/api/dashboard/forecast", post(dashboard::forecast))
        .route(
            "/api/upload",
            post(dashboard::upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route(
            "/api/dashboard/upload",
            post(dashboard::import_sales).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/api/assistant/messages", get(assistant::list_messages).post(assistant::send_message))
        .route("/api/assistant/export", get(assistant::export_chat))
        .route("/api/assistant/import", post(assistant::import_chat))
        .route("/api/reviews", get(reviews::list_reviews).post(reviews::submit_review))
        .route("/api/reviews/events", get(reviews::events))
        .route("/healthz", get(healthz))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
