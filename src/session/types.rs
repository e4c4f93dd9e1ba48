//! Session identity, credentials, and the auth error taxonomy.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

// =============================================================================
// SESSION
// =============================================================================

/// The authenticated identity for this application instance.
///
/// Either fully present or absent: construction goes through [`Session::new`],
/// which refuses blank fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Provider-assigned user identifier.
    pub id: String,
    /// Email the user signed in with.
    pub email: String,
}

impl Session {
    /// Build a session from provider output. Returns `None` if either field is blank.
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let email = email.into();
        if id.trim().is_empty() || email.trim().is_empty() {
            return None;
        }
        Some(Self { id, email })
    }
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Validated sign-in/sign-up input. The secret is never printed.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub secret: String,
}

impl Credentials {
    /// Normalize the email and check both fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidInput`] for a malformed email or empty secret.
    pub fn parse(email: &str, secret: &str) -> Result<Self, AuthError> {
        let email = normalize_email(email).ok_or_else(|| AuthError::InvalidInput("a valid email is required".into()))?;
        if secret.is_empty() {
            return Err(AuthError::InvalidInput("password is required".into()));
        }
        Ok(Self { email, secret: secret.to_owned() })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

// =============================================================================
// ERRORS
// =============================================================================

/// Which form action produced an [`AuthError`]; picks the user-facing verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    SignIn,
    SignUp,
}

impl AuthAction {
    fn verb(self) -> &'static str {
        match self {
            Self::SignIn => "sign in",
            Self::SignUp => "create account",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("identity provider unavailable")]
    NetworkUnavailable,
    #[error("another sign-in is already in progress")]
    AuthInProgress,
    #[error("request cancelled")]
    Cancelled,
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Unknown(String),
}

impl AuthError {
    /// Single human-readable line shown next to the login form.
    #[must_use]
    pub fn user_message(&self, action: AuthAction) -> String {
        format!("Failed to {}: {self}", action.verb())
    }
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::NetworkUnavailable => "E_NETWORK_UNAVAILABLE",
            Self::AuthInProgress => "E_AUTH_IN_PROGRESS",
            Self::Cancelled => "E_CANCELLED",
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::Unknown(_) => "E_AUTH_UNKNOWN",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable | Self::AuthInProgress)
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
