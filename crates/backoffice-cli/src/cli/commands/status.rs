//! Session status: runs the session manager once to a settled state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backoffice_core::auth::RefreshClient;
use backoffice_core::config::Config;
use backoffice_core::identity::IdentityProvider;
use backoffice_core::session::{
    Clock, Session, SessionManager, SessionManagerOptions, SessionState, SystemClock,
};

use super::AppContext;

/// Upper bound on waiting for a refresh to finish.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(45);

pub async fn run(ctx: &AppContext, config: &Config) -> Result<()> {
    let refresher = RefreshClient::new(&config.backend_url()?, ctx.headers.clone());
    let provider: Arc<dyn IdentityProvider> = Arc::clone(&ctx.provider) as _;
    let mut handle = SessionManager::new(
        provider,
        Arc::new(refresher),
        ctx.vault.clone(),
        SessionManagerOptions::from_config(config),
    )
    .spawn();

    let mut state = handle.resolved().await;

    // An expired session is refreshed (or dropped) while the replayed initial
    // event is processed; wait for that outcome.
    let now = SystemClock.now_secs();
    if state.session().is_some_and(|s| s.is_expired_at(now)) {
        let mut rx = handle.watch();
        let settled = tokio::time::timeout(
            SETTLE_TIMEOUT,
            rx.wait_for(|s| !s.session().is_some_and(|s| s.is_expired_at(now))),
        )
        .await;
        if let Ok(Ok(current)) = settled {
            state = current.clone();
        } else {
            tracing::warn!("session did not settle in time");
        }
    }

    handle.shutdown().await;

    match usable_session(&state, SystemClock.now_secs()) {
        Some(session) => {
            if ctx.provider.load().ok().flatten().as_ref() != Some(session) {
                ctx.provider.sign_in(session.clone())?;
            }
            print_authenticated(session);
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

/// The session worth reporting: authenticated and not yet expired.
fn usable_session(state: &SessionState, now: u64) -> Option<&Session> {
    state.session().filter(|s| !s.is_expired_at(now))
}

fn print_authenticated(session: &Session) {
    let remaining = session.remaining_secs(SystemClock.now_secs());
    println!(
        "Authenticated (expires {}, in {remaining}s)",
        format_expiry(session.expires_at)
    );
}

/// Formats an epoch-seconds expiry as RFC 3339 (UTC).
pub fn format_expiry(expires_at: u64) -> String {
    i64::try_from(expires_at)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map_or_else(|| expires_at.to_string(), |dt| dt.to_rfc3339())
}
