//! Identity provider boundary.
//!
//! The store only needs four things from a provider: sign in, sign up, sign
//! out, and a feed of changes the provider originates on its own (token
//! expiry). Calls made through the trait are never echoed on that feed, so
//! the store cannot replay a stale transition after a newer one.

use tokio::sync::broadcast;

use super::types::{AuthError, Credentials, Session};

/// Capacity of provider change feeds. Changes are rare; lag only drops stale expiries.
pub const CHANGE_FEED_CAPACITY: usize = 16;

/// A session change reported by the provider without a call from us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The credential behind `session_id` expired or was revoked.
    Expired { session_id: String },
}

/// Provider-neutral async trait for identity operations. Enables mocking in tests.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate an existing identity.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] on bad credentials or transport failure.
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Create a new identity and authenticate as it.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the identity cannot be created.
    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Drop any provider-side credential for the current identity.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the provider refuses; callers log and continue.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Subscribe to provider-originated changes.
    fn changes(&self) -> broadcast::Receiver<ProviderEvent>;
}
