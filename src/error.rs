//! Error codes shared by every domain error.
//!
//! DESIGN
//! ======
//! Each module owns its `thiserror` enum. Handlers never match on message
//! text; they read the grepable code and retryable flag from this trait and
//! render them as `{ "code", "message", "retryable" }`.

/// Grepable error code and retryable flag for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
