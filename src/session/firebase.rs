//! Firebase Authentication (Identity Toolkit REST) provider.
//!
//! Thin HTTP wrapper for `accounts:signInWithPassword` and `accounts:signUp`.
//! Pure parsing in `parse_grant` and `parse_refresh` for testability.
//!
//! The ID token's lifetime drives a timer that exchanges the refresh token
//! at the secure token endpoint shortly before the ID token lapses. Only a
//! refresh the provider rejects (`TOKEN_EXPIRED`, `USER_DISABLED`, ...) or
//! a run of failed attempts reports expiry on the change feed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::provider::{CHANGE_FEED_CAPACITY, IdentityProvider, ProviderEvent};
use super::types::{AuthError, Credentials, Session};

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";
const CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;
/// Refresh this long before the ID token lapses.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);
/// Delay between attempts after a transient refresh failure.
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(30);
const MAX_REFRESH_ATTEMPTS: u32 = 3;

// =============================================================================
// TOKEN REFRESH
// =============================================================================

/// A refreshed credential: how long the new ID token lives and the token to
/// present next time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenGrant {
    pub lifetime: Duration,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum RefreshError {
    /// The provider refused the refresh token; the session is over.
    #[error("refresh rejected: {0}")]
    Rejected(String),
    /// Network or server trouble; worth another attempt.
    #[error("refresh failed: {0}")]
    Transient(String),
}

/// Exchanges a refresh token for a fresh ID token.
#[async_trait::async_trait]
pub(crate) trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError>;
}

/// `POST {token_url}?key=...` with `grant_type=refresh_token`.
struct SecureTokenRefresher {
    http: reqwest::Client,
    api_key: String,
    token_url: String,
}

#[async_trait::async_trait]
impl TokenRefresher for SecureTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let response = self
            .http
            .post(&self.token_url)
            .query(&[("key", self.api_key.as_str())])
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await
            .map_err(|e| RefreshError::Transient(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| RefreshError::Transient(e.to_string()))?;
        parse_refresh(status, &text)
    }
}

/// Keep the session's ID token fresh until the provider rejects the refresh
/// token, then report the session as expired.
async fn keep_fresh(
    refresher: Arc<dyn TokenRefresher>,
    changes: broadcast::Sender<ProviderEvent>,
    session_id: String,
    lifetime: Duration,
    refresh_token: Option<String>,
) {
    let Some(mut refresh_token) = refresh_token else {
        tokio::time::sleep(lifetime).await;
        tracing::info!(session_id = %session_id, "id token lapsed without a refresh token");
        let _ = changes.send(ProviderEvent::Expired { session_id });
        return;
    };

    let mut wait = lifetime.saturating_sub(REFRESH_MARGIN);
    let mut failures = 0_u32;
    loop {
        tokio::time::sleep(wait).await;
        match refresher.refresh(&refresh_token).await {
            Ok(next) => {
                tracing::debug!(session_id = %session_id, lifetime_secs = next.lifetime.as_secs(), "id token refreshed");
                failures = 0;
                wait = next.lifetime.saturating_sub(REFRESH_MARGIN);
                refresh_token = next.refresh_token;
            }
            Err(RefreshError::Transient(reason)) if failures + 1 < MAX_REFRESH_ATTEMPTS => {
                failures += 1;
                tracing::warn!(session_id = %session_id, failures, %reason, "id token refresh failed; retrying");
                wait = REFRESH_RETRY_DELAY;
            }
            Err(e) => {
                tracing::info!(session_id = %session_id, error = %e, "session expired");
                let _ = changes.send(ProviderEvent::Expired { session_id });
                return;
            }
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct FirebaseIdentity {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    changes: broadcast::Sender<ProviderEvent>,
    refresher: Arc<dyn TokenRefresher>,
    expiry_timer: Mutex<Option<JoinHandle<()>>>,
}

impl FirebaseIdentity {
    /// # Errors
    ///
    /// Returns [`AuthError::Unknown`] if the HTTP client cannot be built.
    pub fn new(api_key: String, base_url: &str, token_url: &str) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::Unknown(format!("http client build failed: {e}")))?;
        let refresher = Arc::new(SecureTokenRefresher {
            http: http.clone(),
            api_key: api_key.clone(),
            token_url: token_url.to_owned(),
        });
        Ok(Self::with_refresher(http, api_key, base_url, refresher))
    }

    pub(crate) fn with_refresher(
        http: reqwest::Client,
        api_key: String,
        base_url: &str,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            changes,
            refresher,
            expiry_timer: Mutex::new(None),
        }
    }

    async fn password_call(&self, endpoint: &str, credentials: &Credentials) -> Result<Session, AuthError> {
        let body = PasswordRequest { email: &credentials.email, password: &credentials.secret, return_secure_token: true };

        let response = self
            .http
            .post(format!("{}/accounts:{endpoint}", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(map_transport)?;

        let grant = parse_grant(status, &text)?;
        self.schedule_expiry(&grant);
        Ok(grant.session)
    }

    fn schedule_expiry(&self, grant: &Grant) {
        let timer = tokio::spawn(keep_fresh(
            Arc::clone(&self.refresher),
            self.changes.clone(),
            grant.session.id.clone(),
            grant.lifetime,
            grant.refresh_token.clone(),
        ));
        self.replace_timer(Some(timer));
    }

    fn replace_timer(&self, timer: Option<JoinHandle<()>>) {
        let mut slot = self
            .expiry_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *slot, timer) {
            previous.abort();
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.password_call("signInWithPassword", credentials).await
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.password_call("signUp", credentials).await
    }

    /// Firebase password sessions are client-held tokens; dropping the refresh timer is all there is.
    async fn sign_out(&self) -> Result<(), AuthError> {
        self.replace_timer(None);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ProviderEvent> {
        self.changes.subscribe()
    }
}

fn map_transport(e: reqwest::Error) -> AuthError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        AuthError::NetworkUnavailable
    } else {
        AuthError::Unknown(e.to_string())
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    email: String,
    #[serde(default)]
    expires_in: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// The secure token endpoint answers in snake case.
#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    expires_in: Option<String>,
    refresh_token: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(Debug)]
pub(crate) struct Grant {
    pub session: Session,
    pub lifetime: Duration,
    pub refresh_token: Option<String>,
}

fn lifetime_of(expires_in: Option<&str>) -> Duration {
    let secs = expires_in
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Duration::from_secs(secs)
}

pub(crate) fn parse_grant(status: u16, body: &str) -> Result<Grant, AuthError> {
    if status != 200 {
        return Err(match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => map_error_message(&envelope.error.message),
            Err(_) => AuthError::Unknown(format!("identity provider returned status {status}")),
        });
    }

    let response: PasswordResponse =
        serde_json::from_str(body).map_err(|e| AuthError::Unknown(format!("unexpected identity response: {e}")))?;
    let lifetime = lifetime_of(response.expires_in.as_deref());
    let refresh_token = response.refresh_token.filter(|t| !t.is_empty());
    let session = Session::new(response.local_id, response.email)
        .ok_or_else(|| AuthError::Unknown("identity provider returned an incomplete identity".into()))?;

    Ok(Grant { session, lifetime, refresh_token })
}

/// Classify a secure token endpoint response. Any 4xx is a rejection
/// (`TOKEN_EXPIRED`, `USER_DISABLED`, `USER_NOT_FOUND`, `INVALID_REFRESH_TOKEN`);
/// anything else unsuccessful may clear up on retry.
pub(crate) fn parse_refresh(status: u16, body: &str) -> Result<TokenGrant, RefreshError> {
    if status != 200 {
        let reason = serde_json::from_str::<ErrorEnvelope>(body)
            .map_or_else(|_| format!("status {status}"), |envelope| envelope.error.message);
        return Err(if (400..500).contains(&status) {
            RefreshError::Rejected(reason)
        } else {
            RefreshError::Transient(reason)
        });
    }

    let response: RefreshResponse =
        serde_json::from_str(body).map_err(|e| RefreshError::Transient(format!("unexpected token response: {e}")))?;
    Ok(TokenGrant { lifetime: lifetime_of(response.expires_in.as_deref()), refresh_token: response.refresh_token })
}

/// Map an Identity Toolkit error message (e.g. `"WEAK_PASSWORD : ..."`) onto [`AuthError`].
pub(crate) fn map_error_message(message: &str) -> AuthError {
    let code = message
        .split([' ', ':'])
        .next()
        .unwrap_or_default();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" | "INVALID_EMAIL" => {
            AuthError::InvalidCredentials
        }
        "EMAIL_EXISTS" => AuthError::Unknown("email already in use".into()),
        "WEAK_PASSWORD" => AuthError::InvalidInput("password must be at least 6 characters".into()),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::Unknown("too many attempts, try again later".into()),
        _ => AuthError::Unknown(message.to_owned()),
    }
}

#[cfg(test)]
#[path = "firebase_test.rs"]
mod tests;
