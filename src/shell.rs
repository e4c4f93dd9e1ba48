//! View shell: which chrome wraps a page.
//!
//! Pure projection of session presence: the navigation bar and footer are
//! shown exactly when someone is signed in.

use serde::Serialize;

use crate::router::{self, Route};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Chrome {
    pub show_nav: bool,
    pub show_footer: bool,
}

#[must_use]
pub fn render(session_present: bool) -> Chrome {
    Chrome { show_nav: session_present, show_footer: session_present }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub path: &'static str,
    pub label: &'static str,
    pub active: bool,
}

const NAV_LINKS: [(&str, &str); 5] = [
    ("/", "Home"),
    ("/dyann", "Dyann"),
    ("/dashboard", "Dashboard"),
    ("/assistant", "Assistant"),
    ("/reviews", "Reviews"),
];

/// Navigation bar entries with the one matching `current_path` marked active.
#[must_use]
pub fn nav_items(current_path: &str) -> Vec<NavItem> {
    let current = router::normalize(current_path);
    NAV_LINKS
        .iter()
        .map(|&(path, label)| NavItem { path, label, active: path == current })
        .collect()
}

/// Everything a client needs to draw the frame around a page.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub path: &'static str,
    pub title: &'static str,
    pub chrome: Chrome,
    /// Empty when the navigation bar is hidden.
    pub nav: Vec<NavItem>,
    /// Shown in the navigation bar's profile button.
    pub user_email: Option<String>,
}

#[must_use]
pub fn page_view(route: &Route, session: Option<&Session>) -> PageView {
    let chrome = render(session.is_some());
    PageView {
        path: route.path,
        title: route.title,
        chrome,
        nav: if chrome.show_nav { nav_items(route.path) } else { Vec::new() },
        user_email: session.map(|s| s.email.clone()),
    }
}

#[cfg(test)]
#[path = "shell_test.rs"]
mod tests;
