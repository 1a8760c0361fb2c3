//! Route gating for protected pages.
//!
//! Decides between the loading placeholder, a login redirect that remembers
//! where the user was going, and rendering the protected content.

use super::SessionSnapshot;

/// Path of the login entry point.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Initial lookup still running: show a neutral placeholder, do not redirect.
    Loading,
    /// Send the user to login; `return_to` is the originally requested target.
    RedirectToLogin { return_to: String },
    Render,
}

impl GateDecision {
    /// Login URL carrying the original target as `next`.
    pub fn login_url(&self) -> Option<String> {
        match self {
            GateDecision::RedirectToLogin { return_to } => {
                let query: String = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("next", return_to)
                    .finish();
                Some(format!("{LOGIN_PATH}?{query}"))
            }
            _ => None,
        }
    }
}

/// Gate in front of protected routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteGate;

impl RouteGate {
    pub fn decide(snapshot: &SessionSnapshot, target: &str) -> GateDecision {
        if snapshot.loading {
            return GateDecision::Loading;
        }
        if snapshot.session.is_some() {
            return GateDecision::Render;
        }
        GateDecision::RedirectToLogin {
            return_to: sanitize_target(target),
        }
    }
}

/// Keeps redirects on-site: anything that is not a local absolute path
/// (or is the login page itself) falls back to the root.
fn sanitize_target(target: &str) -> String {
    let target = target.trim();
    // Browsers read both `//host` and `/\host` as protocol-relative.
    if !target.starts_with('/') || target.starts_with("//") || target.starts_with("/\\") {
        return "/".to_string();
    }
    let path = target.split(['?', '#']).next().unwrap_or_default();
    if path == LOGIN_PATH {
        return "/".to_string();
    }
    target.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionState};

    #[test]
    fn loading_shows_placeholder() {
        let snapshot = SessionState::Loading.snapshot();
        assert_eq!(
            RouteGate::decide(&snapshot, "/invoices"),
            GateDecision::Loading
        );
    }

    #[test]
    fn unauthenticated_redirects_with_target() {
        let snapshot = SessionState::Unauthenticated.snapshot();
        let decision = RouteGate::decide(&snapshot, "/projects/42?tab=tasks");
        assert_eq!(
            decision,
            GateDecision::RedirectToLogin {
                return_to: "/projects/42?tab=tasks".to_string()
            }
        );
        assert_eq!(
            decision.login_url().as_deref(),
            Some("/login?next=%2Fprojects%2F42%3Ftab%3Dtasks")
        );
    }

    #[test]
    fn authenticated_renders() {
        let snapshot = SessionState::Authenticated(Session::new("a", "r", 10)).snapshot();
        let decision = RouteGate::decide(&snapshot, "/staff");
        assert_eq!(decision, GateDecision::Render);
        assert_eq!(decision.login_url(), None);
    }

    #[test]
    fn offsite_targets_fall_back_to_root() {
        let snapshot = SessionState::Unauthenticated.snapshot();
        for target in [
            "https://evil.example",
            "//evil.example",
            "/\\evil.example",
            "/login",
            "/login?next=/x",
            "/login#top",
            "",
        ] {
            assert_eq!(
                RouteGate::decide(&snapshot, target),
                GateDecision::RedirectToLogin {
                    return_to: "/".to_string()
                }
            );
        }
    }

    #[test]
    fn paths_that_merely_start_with_login_are_kept() {
        let snapshot = SessionState::Unauthenticated.snapshot();
        assert_eq!(
            RouteGate::decide(&snapshot, "/login-history?page=2"),
            GateDecision::RedirectToLogin {
                return_to: "/login-history?page=2".to_string()
            }
        );
    }
}
