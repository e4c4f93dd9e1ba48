//! Process configuration parsed from environment variables.
//!
//! Every variable is optional. Hosted adapters (identity, review storage)
//! are enabled by their variables being present; otherwise the in-process
//! adapters are used. Generative model settings live in `llm::config`.

use std::time::Duration;

use crate::session::firebase::{DEFAULT_IDENTITY_BASE_URL, DEFAULT_SECURE_TOKEN_URL};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REVIEWS_POLL_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),
    #[error("invalid FIREBASE_DATABASE_URL '{0}': expected an http(s) URL")]
    InvalidDatabaseUrl(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct FirebaseAuthConfig {
    pub api_key: String,
    pub identity_base_url: String,
    pub token_url: String,
}

impl std::fmt::Debug for FirebaseAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseAuthConfig")
            .field("identity_base_url", &self.identity_base_url)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeDbConfig {
    pub database_url: String,
    /// Wait between a dropped review stream, its fallback poll, and the reconnect.
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Host name or IP literal, as given in `HOST`.
    pub host: String,
    pub port: u16,
    pub auth_timeout: Duration,
    pub firebase_auth: Option<FirebaseAuthConfig>,
    pub realtime_db: Option<RealtimeDbConfig>,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// - `HOST` (default `127.0.0.1`), `PORT` (default 3000)
    /// - `AUTH_TIMEOUT_SECS` (default 10)
    /// - `FIREBASE_API_KEY`, `FIREBASE_AUTH_BASE_URL`, `FIREBASE_TOKEN_URL`: hosted identity provider
    /// - `FIREBASE_DATABASE_URL`, `REVIEWS_POLL_SECS` (default 5): hosted review store and
    ///   the fallback poll and reconnect interval of its live stream
    ///
    /// Unparseable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a blank-containing host or a database URL
    /// that is not http(s).
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_non_empty("HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned());
        if host.contains(char::is_whitespace) || host.contains('/') {
            return Err(ConfigError::InvalidBindAddress(host));
        }
        let port = env_parse("PORT", DEFAULT_PORT);

        let auth_timeout = Duration::from_secs(env_parse("AUTH_TIMEOUT_SECS", DEFAULT_AUTH_TIMEOUT_SECS).max(1));

        let firebase_auth = env_non_empty("FIREBASE_API_KEY").map(|api_key| FirebaseAuthConfig {
            api_key,
            identity_base_url: env_non_empty("FIREBASE_AUTH_BASE_URL")
                .unwrap_or_else(|| DEFAULT_IDENTITY_BASE_URL.to_owned()),
            token_url: env_non_empty("FIREBASE_TOKEN_URL").unwrap_or_else(|| DEFAULT_SECURE_TOKEN_URL.to_owned()),
        });

        let realtime_db = match env_non_empty("FIREBASE_DATABASE_URL") {
            Some(url) if url.starts_with("https://") || url.starts_with("http://") => Some(RealtimeDbConfig {
                database_url: url.trim_end_matches('/').to_owned(),
                poll_interval: Duration::from_secs(env_parse("REVIEWS_POLL_SECS", DEFAULT_REVIEWS_POLL_SECS).max(1)),
            }),
            Some(url) => return Err(ConfigError::InvalidDatabaseUrl(url)),
            None => None,
        };

        Ok(Self { host, port, auth_timeout, firebase_auth, realtime_db })
    }

    /// `host:port` for `TcpListener::bind`, which resolves host names.
    /// IPv6 literals are bracketed.
    pub fn bind_address(&self) -> String {
        let host = self.host.as_str();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{}", self.port)
        } else {
            format!("{host}:{}", self.port)
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
