//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and external-store concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod analytics;
pub mod assistant;
pub mod realtime_db;
pub mod reviews;
pub mod suggestions;
pub mod upload;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
