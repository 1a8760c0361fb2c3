//! Session manager.
//!
//! Owns the single authoritative session. It runs as one task consuming the
//! identity provider's change channel in arrival order:
//!
//! - no session: unauthenticated
//! - session still valid: adopted as-is
//! - session already expired: refreshed against the backend; on success the
//!   new token pair is persisted and a fixed lifetime assumed, on any failure
//!   the provider is signed out
//!
//! Refreshes are awaited inside the loop, so two expired notifications are
//! handled one after the other and never race.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::clock::{Clock, SystemClock};
use super::{Session, SessionSnapshot, SessionState};
use crate::auth::refresh::TokenRefresher;
use crate::auth::vault::TokenVault;
use crate::config::Config;
use crate::identity::{IdentityProvider, SessionChange};

/// Tuning for a session manager.
#[derive(Debug, Clone)]
pub struct SessionManagerOptions {
    /// Venue/tenant code sent with refresh requests.
    pub venue: String,
    /// Lifetime assumed for a refreshed session.
    pub lifetime: Duration,
    /// Upper bound on the initial lookup; `None` waits forever.
    pub lookup_timeout: Option<Duration>,
}

impl SessionManagerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            venue: config.venue(),
            lifetime: config.session_lifetime(),
            lookup_timeout: config.lookup_timeout(),
        }
    }
}

impl Default for SessionManagerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    refresher: Arc<dyn TokenRefresher>,
    vault: TokenVault,
    clock: Arc<dyn Clock>,
    options: SessionManagerOptions,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        refresher: Arc<dyn TokenRefresher>,
        vault: TokenVault,
        options: SessionManagerOptions,
    ) -> Self {
        Self {
            provider,
            refresher,
            vault,
            clock: Arc::new(SystemClock),
            options,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Starts the manager on the current tokio runtime.
    pub fn spawn(self) -> SessionHandle {
        let (state_tx, state_rx) = watch::channel(SessionState::Uninitialized);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(state_tx, cancel.clone()));
        SessionHandle {
            state: state_rx,
            cancel,
            task,
        }
    }

    async fn run(self, state: watch::Sender<SessionState>, cancel: CancellationToken) {
        transition(&state, SessionState::Loading);

        // Subscribe before the lookup so nothing published in between is lost.
        let mut changes = self.provider.subscribe();

        let initial = tokio::select! {
            () = cancel.cancelled() => return,
            session = self.lookup() => session,
        };
        transition(
            &state,
            initial.map_or(SessionState::Unauthenticated, SessionState::Authenticated),
        );

        loop {
            let change = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                change = changes.recv() => change,
            };
            let Some(change) = change else {
                tracing::debug!("identity provider closed the subscription");
                break;
            };
            let next = self.apply(change).await;
            transition(&state, next);
        }

        tracing::debug!("session manager stopped");
    }

    async fn lookup(&self) -> Option<Session> {
        let lookup = self.provider.get_session();
        let result = match self.options.lookup_timeout {
            Some(limit) => {
                if let Ok(result) = tokio::time::timeout(limit, lookup).await {
                    result
                } else {
                    tracing::warn!(
                        timeout_secs = limit.as_secs(),
                        "initial session lookup timed out"
                    );
                    return None;
                }
            }
            None => lookup.await,
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "initial session lookup failed");
            None
        })
    }

    async fn apply(&self, change: SessionChange) -> SessionState {
        tracing::debug!(event = ?change.event, has_session = change.session.is_some(), "session change");
        let now = self.clock.now_secs();
        match change.session {
            None => SessionState::Unauthenticated,
            Some(session) if session.is_expired_at(now) => self.refresh(now).await,
            Some(session) => SessionState::Authenticated(session),
        }
    }

    async fn refresh(&self, now: u64) -> SessionState {
        tracing::info!(venue = %self.options.venue, "session expired, refreshing");

        let tokens = match self.refresher.refresh(&self.options.venue).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(kind = %e.kind, error = %e, "token refresh failed");
                return self.force_sign_out().await;
            }
        };

        let session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: now.saturating_add(self.options.lifetime.as_secs()),
        };

        if let Err(e) = self.vault.store_session(&session) {
            tracing::error!(error = %e, "failed to persist refreshed tokens");
            return self.force_sign_out().await;
        }

        tracing::info!(expires_at = session.expires_at, "session refreshed");
        SessionState::Authenticated(session)
    }

    async fn force_sign_out(&self) -> SessionState {
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(error = %e, "provider sign-out failed");
        }
        SessionState::Unauthenticated
    }
}

fn transition(state: &watch::Sender<SessionState>, next: SessionState) {
    let label = next.to_string();
    let previous = state.send_replace(next);
    if previous.to_string() != label {
        tracing::info!(from = %previous, to = %label, "session state changed");
    }
}

/// Read-only view of a running manager.
///
/// Dropping the handle stops the manager as well; `shutdown` also waits for it.
pub struct SessionHandle {
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The `{session, loading}` pair.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().snapshot()
    }

    /// A receiver that observes every future state.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits until the initial lookup has resolved.
    pub async fn resolved(&mut self) -> SessionState {
        match self.state.wait_for(|s| !s.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => SessionState::Unauthenticated,
        }
    }

    /// Cancels the subscription and waits for the manager to stop.
    ///
    /// An in-flight refresh is allowed to finish first.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            tracing::error!(error = %e, "session manager task failed");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
