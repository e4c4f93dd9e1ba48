//! Static route table and the navigation guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every page request goes through [`guard`] with the current session
//! presence. The guard keeps no state of its own: the same
//! `(session_present, path)` pair always yields the same outcome.

/// Where unauthenticated users are sent.
pub const LOGIN_PATH: &str = "/login";

/// Where signed-in users land instead of the login page.
pub const AFTER_LOGIN_PATH: &str = "/dashboard";

/// One entry of the static route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub requires_auth: bool,
    pub title: &'static str,
}

pub const ROUTES: [Route; 6] = [
    Route { path: "/", requires_auth: false, title: "Home" },
    Route { path: LOGIN_PATH, requires_auth: false, title: "Sign In" },
    Route { path: "/dyann", requires_auth: false, title: "Upload Your Sales Data" },
    Route { path: "/dashboard", requires_auth: true, title: "Sales Dashboard" },
    Route { path: "/assistant", requires_auth: true, title: "Dyann AI Assistant" },
    Route { path: "/reviews", requires_auth: false, title: "Customer Reviews" },
];

/// Outcome of one navigation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation<'a> {
    /// Render the requested path.
    Honor(&'a str),
    /// Replace the requested path with another one.
    Redirect(&'static str),
}

impl<'a> Navigation<'a> {
    /// The path the user ends up on.
    #[must_use]
    pub fn realized_path(self) -> &'a str {
        match self {
            Self::Honor(path) => path,
            Self::Redirect(path) => path,
        }
    }
}

/// Strip a trailing slash so `/dashboard/` and `/dashboard` are one route.
#[must_use]
pub fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Look up a route by path.
#[must_use]
pub fn find(path: &str) -> Option<&'static Route> {
    let path = normalize(path);
    ROUTES.iter().find(|r| r.path == path)
}

#[must_use]
pub fn is_protected(path: &str) -> bool {
    find(path).is_some_and(|r| r.requires_auth)
}

/// Decide where a navigation to `requested` ends up.
///
/// Unknown paths are honored; the caller answers them with "not found".
#[must_use]
pub fn guard(session_present: bool, requested: &str) -> Navigation<'_> {
    if !session_present && is_protected(requested) {
        return Navigation::Redirect(LOGIN_PATH);
    }
    if session_present && normalize(requested) == LOGIN_PATH {
        return Navigation::Redirect(AFTER_LOGIN_PATH);
    }
    Navigation::Honor(requested)
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
