//! Review routes: submit, list, and stream the collection.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures::{Stream, StreamExt};
use tokio::sync::watch;

use super::ApiError;
use crate::services::reviews::{Review, ReviewDraft, ReviewError};
use crate::state::AppState;

fn review_error(err: &ReviewError) -> ApiError {
    let status = match err {
        ReviewError::MissingField(_) => StatusCode::BAD_REQUEST,
        ReviewError::Store(_) => StatusCode::BAD_GATEWAY,
    };
    ApiError::from_error(status, err)
}

/// `GET /api/reviews`: the full collection, oldest first.
pub async fn list_reviews(State(state): State<AppState>) -> Json<Vec<Review>> {
    Json(state.reviews.snapshot())
}

/// `POST /api/reviews`
pub async fn submit_review(
    State(state): State<AppState>,
    Json(draft): Json<ReviewDraft>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    match state.reviews.append(draft).await {
        Ok(review) => Ok((StatusCode::CREATED, Json(review))),
        Err(e) => {
            if let ReviewError::Store(_) = e {
                tracing::error!(error = %e, "review submission failed");
            }
            Err(review_error(&e))
        }
    }
}

/// `GET /api/reviews/events`
///
/// Server-sent events carrying the collection now, then after every change.
pub async fn events(State(state): State<AppState>) -> Response {
    Sse::new(collection_events(&state))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn collection_events(state: &AppState) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let mut rx = state.reviews.subscribe_all();
    let initial = rx.borrow_and_update().clone();

    let changes = futures::stream::unfold(rx, |mut rx: watch::Receiver<Vec<Review>>| async move {
        rx.changed().await.ok()?;
        let next = rx.borrow_and_update().clone();
        Some((next, rx))
    });

    futures::stream::once(async move { initial })
        .chain(changes)
        .map(|reviews| Ok(collection_event(&reviews)))
        .take_until(state.shutdown.clone().cancelled_owned())
}

fn collection_event(reviews: &[Review]) -> Event {
    Event::default()
        .event("reviews")
        .data(serde_json::to_string(reviews).unwrap_or_default())
}

#[cfg(test)]
#[path = "reviews_test.rs"]
mod tests;
