//! Identity provider abstraction.
//!
//! A provider answers one-shot session lookups, publishes every change to its
//! own session state onto per-subscriber channels, and signs out. The first
//! event a new subscriber receives is `AuthEvent::InitialSession` carrying the
//! provider's current session.

mod file;
mod memory;

use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use file::{FileIdentityProvider, RemoteLogout};
pub use memory::MemoryIdentityProvider;

use crate::session::Session;

/// Why the provider's session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEvent {
    /// Replayed to every new subscriber.
    InitialSession,
    SignedIn,
    TokenRefreshed,
    SignedOut,
}

/// One notification from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEvent::SignedOut, None)
    }
}

/// Sender half of a subscription.
pub type SessionChangeTx = mpsc::UnboundedSender<SessionChange>;

/// Receiver half of a subscription; dropping it cancels the subscription.
pub type SessionChangeRx = mpsc::UnboundedReceiver<SessionChange>;

pub trait IdentityProvider: Send + Sync {
    /// One-shot lookup of the provider's current session.
    fn get_session(&self) -> BoxFuture<'_, Result<Option<Session>>>;

    /// Opens a new change subscription.
    fn subscribe(&self) -> SessionChangeRx;

    /// Ends the provider-level session and notifies subscribers.
    fn sign_out(&self) -> BoxFuture<'_, Result<()>>;
}

/// Fan-out of session changes to every live subscriber, in publish order.
#[derive(Debug, Default)]
pub(crate) struct ChangeBroadcaster {
    senders: Mutex<Vec<SessionChangeTx>>,
}

impl ChangeBroadcaster {
    /// Registers a subscriber and queues `initial` as its first event.
    pub(crate) fn subscribe(&self, initial: Option<Session>) -> SessionChangeRx {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        // Queued under the lock so no publish can slip in ahead of it.
        let _ = tx.send(SessionChange::new(AuthEvent::InitialSession, initial));
        senders.push(tx);
        rx
    }

    /// Delivers `change` to every subscriber, dropping the ones that went away.
    pub(crate) fn publish(&self, change: &SessionChange) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|tx| tx.send(change.clone()).is_ok());
        tracing::debug!(
            event = ?change.event,
            subscribers = senders.len(),
            "session change published"
        );
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}
