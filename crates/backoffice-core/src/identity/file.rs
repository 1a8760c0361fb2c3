//! Identity provider persisted to disk.
//!
//! Keeps the provider's full session (tokens and expiry) in `session.json`,
//! separate from the token pair the API clients read. Optionally tells the
//! remote provider about sign-outs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use super::{AuthEvent, ChangeBroadcaster, IdentityProvider, SessionChange, SessionChangeRx};
use crate::auth::headers::{HeaderBuilder, HeaderFlags};
use crate::auth::store::write_private;
use crate::session::Session;

/// Path of the provider's logout endpoint relative to its base URL.
pub const LOGOUT_PATH: &str = "/auth/v1/logout";

/// Best-effort sign-out call against the remote identity provider.
#[derive(Debug, Clone)]
pub struct RemoteLogout {
    http: reqwest::Client,
    url: String,
    headers: HeaderBuilder,
}

impl RemoteLogout {
    pub fn new(base_url: &str, headers: HeaderBuilder) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{}{LOGOUT_PATH}", base_url.trim_end_matches('/')),
            headers,
        }
    }

    /// Revokes `session` remotely. Failures are logged, never returned.
    async fn revoke(&self, session: &Session) {
        let mut headers = self.headers.build(HeaderMap::new(), HeaderFlags::default().api_key());
        // The session being revoked may be newer than the stored token pair.
        if let Ok(mut bearer) = HeaderValue::from_str(&format!("Bearer {}", session.access_token))
        {
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }

        match self.http.post(&self.url).headers(headers).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("remote sign-out acknowledged");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "remote sign-out rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote sign-out failed");
            }
        }
    }
}

#[derive(Debug)]
pub struct FileIdentityProvider {
    path: PathBuf,
    // Serializes read-modify-notify so subscribers see changes in file order.
    lock: Mutex<()>,
    broadcaster: ChangeBroadcaster,
    remote: Option<RemoteLogout>,
}

impl FileIdentityProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            broadcaster: ChangeBroadcaster::default(),
            remote: None,
        }
    }

    #[must_use]
    pub fn with_remote_logout(mut self, remote: RemoteLogout) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted session, if any.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<Session>> {
        read_session(&self.path)
    }

    /// Persists `session` and notifies subscribers.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn sign_in(&self, session: Session) -> Result<()> {
        self.store(AuthEvent::SignedIn, session)
    }

    fn store(&self, event: AuthEvent, session: Session) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let contents =
            serde_json::to_string_pretty(&session).context("Failed to serialize session")?;
        write_private(&self.path, contents.as_bytes())?;
        self.broadcaster.publish(&SessionChange::new(event, Some(session)));
        Ok(())
    }

    /// Removes the session file; returns the session that was there.
    fn remove(&self) -> Result<Option<Session>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = read_session(&self.path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "discarding unreadable session file");
            None
        });
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        self.broadcaster.publish(&SessionChange::signed_out());
        Ok(previous)
    }
}

fn read_session(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session from {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&contents)
        .map(Some)
        .with_context(|| format!("Failed to parse session from {}", path.display()))
}

impl IdentityProvider for FileIdentityProvider {
    fn get_session(&self) -> BoxFuture<'_, Result<Option<Session>>> {
        Box::pin(async move { self.load() })
    }

    fn subscribe(&self) -> SessionChangeRx {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = read_session(&self.path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "treating unreadable session file as signed out");
            None
        });
        self.broadcaster.subscribe(current)
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let previous = self.remove()?;
            if let (Some(remote), Some(session)) = (&self.remote, previous.as_ref()) {
                remote.revoke(session).await;
            }
            tracing::info!("signed out");
            Ok(())
        })
    }
}
