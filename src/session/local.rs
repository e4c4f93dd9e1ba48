//! In-process identity provider.
//!
//! Used when no hosted identity provider is configured, and as the real
//! provider in tests. Accounts live in memory for the life of the process;
//! secrets are stored as salted SHA-256 digests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::provider::{CHANGE_FEED_CAPACITY, IdentityProvider, ProviderEvent};
use super::types::{AuthError, Credentials, Session};

/// Same floor the hosted provider enforces.
pub const MIN_SECRET_LEN: usize = 6;

struct Account {
    id: String,
    salt: String,
    digest: String,
}

pub struct LocalIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    changes: broadcast::Sender<ProviderEvent>,
}

impl LocalIdentity {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { accounts: Mutex::new(HashMap::new()), changes }
    }

    /// Revoke the credential behind `session_id`, as a hosted provider would on expiry.
    pub fn expire(&self, session_id: &str) {
        let _ = self.changes.send(ProviderEvent::Expired { session_id: session_id.to_owned() });
    }

    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    to_hex(&bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn digest_secret(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    to_hex(&hasher.finalize())
}

#[async_trait::async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let accounts = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let account = accounts
            .get(&credentials.email)
            .ok_or(AuthError::InvalidCredentials)?;
        if digest_secret(&account.salt, &credentials.secret) != account.digest {
            return Err(AuthError::InvalidCredentials);
        }
        Session::new(account.id.clone(), credentials.email.clone())
            .ok_or_else(|| AuthError::Unknown("incomplete identity".into()))
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        if credentials.secret.chars().count() < MIN_SECRET_LEN {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {MIN_SECRET_LEN} characters"
            )));
        }

        let mut accounts = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if accounts.contains_key(&credentials.email) {
            return Err(AuthError::Unknown("email already in use".into()));
        }

        let salt = generate_salt();
        let account = Account {
            id: Uuid::new_v4().to_string(),
            digest: digest_secret(&salt, &credentials.secret),
            salt,
        };
        let session = Session::new(account.id.clone(), credentials.email.clone())
            .ok_or_else(|| AuthError::Unknown("incomplete identity".into()))?;
        accounts.insert(credentials.email.clone(), account);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ProviderEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[path = "local_test.rs"]
mod tests;
