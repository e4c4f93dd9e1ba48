//! Session store: the single owner of "who is signed in".
//!
//! ARCHITECTURE
//! ============
//! One `SessionStore` exists per process, built at startup and shared as
//! `Arc<SessionStore>` through `AppState`. Readers call [`SessionStore::current`]
//! synchronously; reactive consumers register callbacks with
//! [`SessionStore::subscribe`].
//!
//! Every state change flows through one transition section: write the new
//! value, then run every callback with it, all under the transition lock.
//! Transitions are therefore delivered to each subscriber in order, and a
//! reader that runs once notification has begun already sees the new value.
//!
//! CONCURRENCY
//! ===========
//! - Sign-in and sign-up are serialized: a second attempt while one is in
//!   flight fails with `AuthInProgress` instead of racing two provider calls.
//! - Sign-out queues behind an in-flight attempt, then clears.
//! - Provider calls are bounded by a timeout (`NetworkUnavailable` on expiry)
//!   and abandoned with `Cancelled` once [`SessionStore::shutdown`] runs.
//! - Provider expiry events apply immediately, but only to the session they
//!   name; an expiry for an older session is ignored.

pub mod firebase;
pub mod local;
pub mod provider;
pub mod types;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use provider::{IdentityProvider, ProviderEvent};
pub use types::{AuthAction, AuthError, Credentials, Session};

/// Default bound on a single identity provider call.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Callback invoked with the new session (or `None`) on every transition.
pub type SessionCallback = dyn Fn(Option<&Session>) + Send + Sync;

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(u64, Arc<SessionCallback>)>,
}

/// Handle returned by [`SessionStore::subscribe`]. Dropping it deregisters the callback.
#[must_use = "dropping the subscription deregisters the callback"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    /// Deregister explicitly. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// What caused a transition. Logged, never branched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    SignIn,
    SignUp,
    SignOut,
    ProviderExpiry,
}

pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    current: RwLock<Option<Session>>,
    subscribers: Arc<Mutex<Subscribers>>,
    transition: Mutex<()>,
    auth_gate: tokio::sync::Mutex<()>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl SessionStore {
    /// Build a store without listening to provider changes.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            current: RwLock::new(None),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            transition: Mutex::new(()),
            auth_gate: tokio::sync::Mutex::new(()),
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Build a store and spawn the task that applies provider change events.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn start(provider: Arc<dyn IdentityProvider>, timeout: Duration) -> Arc<Self> {
        let changes = provider.changes();
        let store = Arc::new(Self::new(provider, timeout));
        spawn_change_listener(&store, changes);
        store
    }

    /// Latest known session, read synchronously.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Register a callback for every future transition.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&Session>) + Send + Sync + 'static,
    {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.entries.push((id, Arc::new(callback)));
        Subscription { id, subscribers: Arc::downgrade(&self.subscribers) }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Sign in through the identity provider.
    ///
    /// Subscribers are notified before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthInProgress`] if another attempt is in flight,
    /// [`AuthError::NetworkUnavailable`] on timeout, or the provider's error.
    pub async fn sign_in(&self, email: &str, secret: &str) -> Result<Session, AuthError> {
        self.authenticate(email, secret, Cause::SignIn).await
    }

    /// Create an identity and sign in as it. Same contract as [`Self::sign_in`].
    ///
    /// # Errors
    ///
    /// See [`Self::sign_in`].
    pub async fn sign_up(&self, email: &str, secret: &str) -> Result<Session, AuthError> {
        self.authenticate(email, secret, Cause::SignUp).await
    }

    /// Clear the session. Never fails; provider errors are logged.
    ///
    /// Signing out while already signed out notifies nobody.
    pub async fn sign_out(&self) {
        let _gate = self.auth_gate.lock().await;
        if let Err(e) = self.call_provider(self.provider.sign_out()).await {
            warn!(error = %e, "identity provider sign-out failed; clearing local session anyway");
        }
        self.apply(None, Cause::SignOut);
    }

    /// Abandon in-flight provider calls and stop listening for provider changes.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn authenticate(&self, email: &str, secret: &str, cause: Cause) -> Result<Session, AuthError> {
        let credentials = Credentials::parse(email, secret)?;
        let _gate = self
            .auth_gate
            .try_lock()
            .map_err(|_| AuthError::AuthInProgress)?;

        let result = match cause {
            Cause::SignUp => self.call_provider(self.provider.sign_up(&credentials)).await,
            _ => self.call_provider(self.provider.sign_in(&credentials)).await,
        };

        match result {
            Ok(session) => {
                self.apply(Some(session.clone()), cause);
                Ok(session)
            }
            Err(e) => {
                warn!(?cause, error = %e, "authentication failed");
                Err(e)
            }
        }
    }

    async fn call_provider<T>(&self, call: impl Future<Output = Result<T, AuthError>>) -> Result<T, AuthError> {
        tokio::select! {
            () = self.cancel.cancelled() => Err(AuthError::Cancelled),
            result = tokio::time::timeout(self.timeout, call) => {
                result.unwrap_or(Err(AuthError::NetworkUnavailable))
            }
        }
    }

    fn apply_provider_event(&self, event: ProviderEvent) {
        let ProviderEvent::Expired { session_id } = event;
        let _transition = self
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let matches = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| s.id == session_id);
        if !matches {
            info!(%session_id, "ignoring expiry for a session that is no longer current");
            return;
        }
        self.write_and_notify(None, Cause::ProviderExpiry);
    }

    /// Run one transition. Returns `false` when the state did not change.
    fn apply(&self, next: Option<Session>, cause: Cause) -> bool {
        let _transition = self
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.write_and_notify(next, cause)
    }

    /// Caller must hold the transition lock.
    fn write_and_notify(&self, next: Option<Session>, cause: Cause) -> bool {
        {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *current == next {
                return false;
            }
            current.clone_from(&next);
        }

        // Snapshot so callbacks may subscribe or drop handles without deadlocking.
        let callbacks: Vec<Arc<SessionCallback>> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        info!(
            ?cause,
            signed_in = next.is_some(),
            subscribers = callbacks.len(),
            "session transition"
        );
        for callback in callbacks {
            callback(next.as_ref());
        }
        true
    }
}

fn spawn_change_listener(
    store: &Arc<SessionStore>,
    mut changes: tokio::sync::broadcast::Receiver<ProviderEvent>,
) {
    let weak = Arc::downgrade(store);
    let cancel = store.cancel.clone();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                event = changes.recv() => event,
            };
            match event {
                Ok(event) => {
                    let Some(store) = weak.upgrade() else { break };
                    store.apply_provider_event(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "provider change feed lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
