//! Customer reviews: submission, validation, and the live collection.
//!
//! DESIGN
//! ======
//! The review store is a document store keyed by push order. Readers never
//! page: every change republishes the whole collection on a `watch` channel,
//! so a subscriber always holds the latest full list and a late subscriber
//! sees the current one immediately.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ErrorCode;

use super::now_ms;

// =============================================================================
// TYPES
// =============================================================================

/// A stored review. `timestamp` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub name: String,
    pub contact: String,
    pub email: String,
    pub feedback: String,
    pub timestamp: i64,
}

/// A review as submitted, before the store stamps it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub feedback: String,
}

impl ReviewDraft {
    /// Trim every field and require all four.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::MissingField`] naming the first blank field.
    pub fn validate(self) -> Result<Self, ReviewError> {
        let draft = Self {
            name: self.name.trim().to_owned(),
            contact: self.contact.trim().to_owned(),
            email: self.email.trim().to_owned(),
            feedback: self.feedback.trim().to_owned(),
        };
        for (field, value) in [
            ("name", &draft.name),
            ("contact", &draft.contact),
            ("email", &draft.email),
            ("feedback", &draft.feedback),
        ] {
            if value.is_empty() {
                return Err(ReviewError::MissingField(field));
            }
        }
        Ok(draft)
    }

    /// Stamp a validated draft with the given time.
    #[must_use]
    pub fn into_review(self, timestamp: i64) -> Review {
        Review { name: self.name, contact: self.contact, email: self.email, feedback: self.feedback, timestamp }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("review store error: {0}")]
    Store(String),
}

impl ErrorCode for ReviewError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "E_MISSING_FIELD",
            Self::Store(_) => "E_REVIEW_STORE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait ReviewStore: Send + Sync {
    /// Validate, stamp, and store one review. Returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::MissingField`] for an incomplete draft or
    /// [`ReviewError::Store`] if the backing store rejects the write.
    async fn append(&self, draft: ReviewDraft) -> Result<Review, ReviewError>;

    /// Receiver that yields the full collection after every change.
    fn subscribe_all(&self) -> watch::Receiver<Vec<Review>>;

    /// Current full collection, oldest first.
    fn snapshot(&self) -> Vec<Review> {
        self.subscribe_all().borrow().clone()
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Process-local review store.
pub struct MemoryReviewStore {
    collection: watch::Sender<Vec<Review>>,
}

impl MemoryReviewStore {
    #[must_use]
    pub fn new() -> Self {
        let (collection, _) = watch::channel(Vec::new());
        Self { collection }
    }
}

impl Default for MemoryReviewStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn append(&self, draft: ReviewDraft) -> Result<Review, ReviewError> {
        let review = draft.validate()?.into_review(now_ms());
        self.collection.send_modify(|all| all.push(review.clone()));
        tracing::info!(total = self.collection.borrow().len(), "review stored");
        Ok(review)
    }

    fn subscribe_all(&self) -> watch::Receiver<Vec<Review>> {
        self.collection.subscribe()
    }
}

#[cfg(test)]
#[path = "reviews_test.rs"]
mod tests;
