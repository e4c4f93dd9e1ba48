//! Firebase Realtime Database review store.
//!
//! DESIGN
//! ======
//! Reviews live under the `reviews` path, one child per push key, with the
//! hosted schema's field names (`user_name`, `user_contact`, `user_email`,
//! `feedback`, `timestamp`). The store mirrors that subtree as raw JSON.
//!
//! A background task holds the REST streaming channel open
//! (`GET reviews.json` with `Accept: text/event-stream`) and applies each
//! `put` and `patch` event to the mirror, republishing the collection on the
//! `watch` channel only when it changed. When the stream drops, is cancelled
//! by the server, or loses its auth, the task falls back to one plain GET,
//! waits the retry interval and reconnects.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::now_ms;
use super::reviews::{Review, ReviewDraft, ReviewError, ReviewStore};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 15;

fn store_error(e: impl std::fmt::Display) -> ReviewError {
    ReviewError::Store(e.to_string())
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct RealtimeDbReviews {
    http: reqwest::Client,
    /// No overall timeout: the event stream stays open indefinitely.
    stream_http: reqwest::Client,
    database_url: String,
    tree: Mutex<Value>,
    collection: watch::Sender<Vec<Review>>,
}

impl RealtimeDbReviews {
    /// # Errors
    ///
    /// Returns [`ReviewError::Store`] if the HTTP clients cannot be built.
    pub fn new(database_url: &str) -> Result<Self, ReviewError> {
        let connect_timeout = Duration::from_secs(CONNECT_TIMEOUT_SECS);
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ReviewError::Store(format!("http client build failed: {e}")))?;
        let stream_http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ReviewError::Store(format!("http client build failed: {e}")))?;
        let (collection, _) = watch::channel(Vec::new());
        Ok(Self {
            http,
            stream_http,
            database_url: database_url.trim_end_matches('/').to_owned(),
            tree: Mutex::new(Value::Null),
            collection,
        })
    }

    fn reviews_url(&self) -> String {
        format!("{}/reviews.json", self.database_url)
    }

    /// Fetch the whole collection and publish it if it changed.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Store`] on transport failure, a non-success
    /// status, or an unreadable body.
    pub async fn refresh(&self) -> Result<usize, ReviewError> {
        let response = self.http.get(self.reviews_url()).send().await.map_err(store_error)?;
        let status = response.status();
        let body = response.text().await.map_err(store_error)?;
        if !status.is_success() {
            return Err(ReviewError::Store(format!("GET reviews returned {status}")));
        }

        let tree: Value =
            serde_json::from_str(&body).map_err(|e| ReviewError::Store(format!("unreadable reviews body: {e}")))?;
        *self.tree.lock().unwrap_or_else(PoisonError::into_inner) = tree;
        Ok(self.publish())
    }

    /// Republish the collection from the mirror; returns its size.
    fn publish(&self) -> usize {
        let reviews = collection_from_tree(&self.tree.lock().unwrap_or_else(PoisonError::into_inner));
        let count = reviews.len();
        self.collection.send_if_modified(|current| {
            if *current == reviews {
                return false;
            }
            *current = reviews;
            true
        });
        count
    }

    /// Spawn the streaming task. Between connections it polls once and waits
    /// `retry`. It stops when `cancel` fires.
    pub fn spawn_live(self: &Arc<Self>, retry: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            while !cancel.is_cancelled() {
                match store.stream_once(&cancel).await {
                    Ok(()) => debug!("review stream closed"),
                    Err(e) => warn!(error = %e, "review stream dropped"),
                }
                if cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = store.refresh().await {
                    error!(error = %e, "review sync failed");
                }
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(retry) => {}
                }
            }
        })
    }

    /// Hold one event stream until it ends, asks to reconnect, or `cancel` fires.
    async fn stream_once(&self, cancel: &CancellationToken) -> Result<(), ReviewError> {
        let request = self.stream_http.get(self.reviews_url()).header(ACCEPT, "text/event-stream").send();
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            response = request => response.map_err(store_error)?,
        };
        let status = response.status();
        if !status.is_success() {
            return Err(ReviewError::Store(format!("review stream returned {status}")));
        }
        info!("review stream connected");

        let mut chunks = std::pin::pin!(response.bytes_stream());
        let mut decoder = EventDecoder::default();
        loop {
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                chunk = chunks.next() => chunk,
            };
            let Some(chunk) = chunk else { return Ok(()) };
            for event in decoder.push(&chunk.map_err(store_error)?) {
                if self.apply(&event)? == StreamAction::Reconnect {
                    info!(event = %event.event, "review stream ended by server");
                    return Ok(());
                }
            }
        }
    }

    fn apply(&self, event: &StreamEvent) -> Result<StreamAction, ReviewError> {
        let action = apply_event(&mut self.tree.lock().unwrap_or_else(PoisonError::into_inner), event)?;
        if action == StreamAction::Changed {
            self.publish();
        }
        Ok(action)
    }
}

#[async_trait::async_trait]
impl ReviewStore for RealtimeDbReviews {
    async fn append(&self, draft: ReviewDraft) -> Result<Review, ReviewError> {
        let review = draft.validate()?.into_review(now_ms());

        let response = self
            .http
            .post(self.reviews_url())
            .json(&StoredReview::from(&review))
            .send()
            .await
            .map_err(|e| ReviewError::Store(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ReviewError::Store(format!("POST reviews returned {status}: {body}")));
        }

        // The writer sees its own review without waiting for the stream echo.
        match serde_json::from_str::<PushResponse>(&body) {
            Ok(pushed) => {
                let stored = serde_json::to_value(StoredReview::from(&review)).map_err(store_error)?;
                put_at(&mut self.tree.lock().unwrap_or_else(PoisonError::into_inner), &pushed.name, stored);
                self.publish();
            }
            Err(e) => {
                warn!(error = %e, "unexpected push response; refreshing");
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "refresh after append failed; publishing locally");
                    self.collection.send_modify(|all| all.push(review.clone()));
                }
            }
        }
        Ok(review)
    }

    fn subscribe_all(&self) -> watch::Receiver<Vec<Review>> {
        self.collection.subscribe()
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize, Deserialize)]
struct StoredReview {
    user_name: String,
    user_contact: String,
    user_email: String,
    feedback: String,
    timestamp: i64,
}

impl From<&Review> for StoredReview {
    fn from(r: &Review) -> Self {
        Self {
            user_name: r.name.clone(),
            user_contact: r.contact.clone(),
            user_email: r.email.clone(),
            feedback: r.feedback.clone(),
            timestamp: r.timestamp,
        }
    }
}

impl From<StoredReview> for Review {
    fn from(s: StoredReview) -> Self {
        Self { name: s.user_name, contact: s.user_contact, email: s.user_email, feedback: s.feedback, timestamp: s.timestamp }
    }
}

/// `POST` answers with the generated push key.
#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

/// Body of a `put` or `patch` event.
#[derive(Deserialize)]
struct EventPayload {
    path: String,
    data: Value,
}

// =============================================================================
// EVENT STREAM
// =============================================================================

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct StreamEvent {
    pub event: String,
    pub data: String,
}

/// Splits a `text/event-stream` body into events. Chunks may end mid-line.
#[derive(Debug, Default)]
pub(crate) struct EventDecoder {
    buffer: Vec<u8>,
    pending: StreamEvent,
    data_lines: Vec<String>,
}

impl EventDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.pending.event.is_empty() || !self.data_lines.is_empty() {
                    let mut event = std::mem::take(&mut self.pending);
                    event.data = std::mem::take(&mut self.data_lines).join("\n");
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => value.clone_into(&mut self.pending.event),
                "data" => self.data_lines.push(value.to_owned()),
                _ => {}
            }
        }
        events
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamAction {
    Changed,
    Ignored,
    /// The server cancelled the stream or revoked its auth.
    Reconnect,
}

/// Apply one event to the mirrored subtree.
///
/// `put` replaces the value at `path` (`null` deletes it); `patch` replaces
/// each named child under `path`.
pub(crate) fn apply_event(tree: &mut Value, event: &StreamEvent) -> Result<StreamAction, ReviewError> {
    match event.event.as_str() {
        "put" | "patch" => {
            let payload: EventPayload = serde_json::from_str(&event.data)
                .map_err(|e| ReviewError::Store(format!("unreadable {} event: {e}", event.event)))?;
            if event.event == "put" {
                put_at(tree, &payload.path, payload.data);
            } else {
                let Value::Object(children) = payload.data else {
                    return Err(ReviewError::Store("patch event without an object".into()));
                };
                for (key, value) in children {
                    put_at(tree, &format!("{}/{key}", payload.path), value);
                }
            }
            Ok(StreamAction::Changed)
        }
        "cancel" | "auth_revoked" => Ok(StreamAction::Reconnect),
        "keep-alive" => Ok(StreamAction::Ignored),
        other => {
            debug!(event = other, "ignoring review stream event");
            Ok(StreamAction::Ignored)
        }
    }
}

/// Set the value at a `/`-separated path below `tree`, creating objects on
/// the way. `null` removes the value instead.
fn put_at(tree: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        *tree = data;
        return;
    };

    let mut node = tree;
    for segment in parents {
        if data.is_null() && node.get(*segment).is_none() {
            return;
        }
        node = object_mut(node).entry((*segment).to_owned()).or_insert(Value::Null);
    }
    if data.is_null() {
        if let Some(children) = node.as_object_mut() {
            children.remove(*last);
        }
    } else {
        object_mut(node).insert((*last).to_owned(), data);
    }
}

fn object_mut(node: &mut Value) -> &mut Map<String, Value> {
    match node {
        Value::Object(children) => children,
        other => {
            *other = Value::Object(Map::new());
            object_mut(other)
        }
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Decode the `reviews.json` body into a collection ordered oldest first.
///
/// # Errors
///
/// Returns [`ReviewError::Store`] if the body is not JSON.
pub(crate) fn parse_collection(body: &str) -> Result<Vec<Review>, ReviewError> {
    let tree: Value =
        serde_json::from_str(body).map_err(|e| ReviewError::Store(format!("unreadable reviews body: {e}")))?;
    Ok(collection_from_tree(&tree))
}

/// An empty path reads back as `null`. Children that do not match the schema
/// are skipped with a warning instead of failing the whole read.
fn collection_from_tree(tree: &Value) -> Vec<Review> {
    let children = match tree {
        Value::Object(children) => children,
        Value::Null => return Vec::new(),
        other => {
            warn!(kind = ?other, "reviews path is not an object");
            return Vec::new();
        }
    };

    let mut reviews: Vec<Review> = children
        .iter()
        .filter_map(|(key, value)| match StoredReview::deserialize(value) {
            Ok(stored) => Some(Review::from(stored)),
            Err(e) => {
                warn!(%key, error = %e, "skipping malformed review");
                None
            }
        })
        .collect();

    // Push keys already sort chronologically; the stable sort keeps that order for equal stamps.
    reviews.sort_by_key(|r| r.timestamp);
    reviews
}

#[cfg(test)]
#[path = "realtime_db_test.rs"]
mod tests;
