//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod headers;
pub mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use backoffice_core::auth::{ApiKeys, FileTokenStore, HeaderBuilder, TokenVault};
use backoffice_core::config::{Config, paths};
use backoffice_core::identity::{FileIdentityProvider, RemoteLogout};

/// Everything a command needs, wired once from config.
pub struct AppContext {
    pub vault: TokenVault,
    pub headers: HeaderBuilder,
    pub provider: Arc<FileIdentityProvider>,
}

impl AppContext {
    pub fn open(config: &Config) -> Result<Self> {
        let store = FileTokenStore::new(paths::tokens_path());
        let vault = TokenVault::open(Arc::new(store)).context("open token storage")?;
        let headers = HeaderBuilder::new(vault.clone(), ApiKeys::from_config(config));

        let mut provider = FileIdentityProvider::new(paths::session_path());
        if let Some(url) = config.identity_url()? {
            provider = provider.with_remote_logout(RemoteLogout::new(&url, headers.clone()));
        }

        Ok(Self {
            vault,
            headers,
            provider: Arc::new(provider),
        })
    }
}
