//! Session model and lifecycle.

pub mod clock;
pub mod gate;
pub mod manager;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use clock::{Clock, SystemClock};
pub use gate::{GateDecision, RouteGate};
pub use manager::{SessionHandle, SessionManager, SessionManagerOptions};

/// A logged-in identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry in seconds since the Unix epoch.
    pub expires_at: u64,
}

impl Session {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: u64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Returns true unless the expiry is strictly in the future.
    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        self.expires_at <= now_secs
    }

    /// Seconds left before expiry, zero once expired.
    pub fn remaining_secs(&self, now_secs: u64) -> u64 {
        self.expires_at.saturating_sub(now_secs)
    }
}

// Tokens never reach logs through `{:?}`.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field(
                "access_token",
                &crate::logging::mask_token(&self.access_token),
            )
            .field(
                "refresh_token",
                &crate::logging::mask_token(&self.refresh_token),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authentication state owned by the session manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// The manager has not started yet.
    #[default]
    Uninitialized,
    /// The initial lookup is outstanding; consumers must not redirect.
    Loading,
    Authenticated(Session),
    Unauthenticated,
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Uninitialized | SessionState::Loading)
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// Returns the `{session, loading}` pair consumers render from.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session().cloned(),
            loading: self.is_loading(),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Loading => write!(f, "loading"),
            SessionState::Authenticated(_) => write!(f, "authenticated"),
            SessionState::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// What gating consumers read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub loading: bool,
}
