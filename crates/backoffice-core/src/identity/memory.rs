//! In-process identity provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use futures_util::future::BoxFuture;

use super::{AuthEvent, ChangeBroadcaster, IdentityProvider, SessionChange, SessionChangeRx};
use crate::session::Session;

/// Provider that keeps its session in memory.
///
/// Useful when embedding the session manager next to a provider SDK that
/// pushes changes in, and for exercising the manager in tests.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    session: Mutex<Option<Session>>,
    broadcaster: ChangeBroadcaster,
    sign_outs: AtomicUsize,
    fail_lookup: bool,
}

impl MemoryIdentityProvider {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            session: Mutex::new(session),
            ..Default::default()
        }
    }

    /// Provider whose `get_session` always errors.
    pub fn failing_lookup() -> Self {
        Self {
            fail_lookup: true,
            ..Default::default()
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the session and notifies subscribers with `event`.
    pub fn publish(&self, event: AuthEvent, session: Option<Session>) {
        let mut current = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        current.clone_from(&session);
        self.broadcaster.publish(&SessionChange::new(event, session));
    }

    pub fn sign_in(&self, session: Session) {
        self.publish(AuthEvent::SignedIn, Some(session));
    }

    /// Number of `sign_out` calls so far.
    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn get_session(&self) -> BoxFuture<'_, Result<Option<Session>>> {
        Box::pin(async move {
            if self.fail_lookup {
                anyhow::bail!("identity provider unavailable");
            }
            Ok(self.current())
        })
    }

    fn subscribe(&self) -> SessionChangeRx {
        let current = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        self.broadcaster.subscribe(current.clone())
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);
            self.publish(AuthEvent::SignedOut, None);
            Ok(())
        })
    }
}
