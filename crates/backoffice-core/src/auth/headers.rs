//! Authenticated request headers.
//!
//! Every API client calls the builder right before dispatching a request. The
//! builder never fails: a missing token or key simply leaves its header unset.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};

use super::vault::TokenVault;
use crate::config::Config;

/// Identity provider public key header.
pub const API_KEY_HEADER: &str = "apikey";
/// First static key identifying admin console traffic.
pub const CLIENT_API_KEY_HEADER: &str = "x-api-key";
/// Second static key identifying admin console traffic.
pub const CLIENT_KEY_HEADER: &str = "x-client-key";

/// Which credentials to attach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderFlags {
    /// Attach the identity provider API key.
    pub use_api_key: bool,
    /// Send the refresh token as bearer instead of the access token.
    pub use_refresh_token: bool,
    /// Attach the two static client keys.
    pub use_client_api_key: bool,
}

impl HeaderFlags {
    pub fn api_key(mut self) -> Self {
        self.use_api_key = true;
        self
    }

    pub fn refresh_token(mut self) -> Self {
        self.use_refresh_token = true;
        self
    }

    pub fn client_api_key(mut self) -> Self {
        self.use_client_api_key = true;
        self
    }
}

/// Static keys attached on request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    pub identity_api_key: Option<String>,
    pub client_api_key: Option<String>,
    pub client_key: Option<String>,
}

impl ApiKeys {
    pub fn from_config(config: &Config) -> Self {
        Self {
            identity_api_key: config.identity_api_key(),
            client_api_key: config.client_api_key(),
            client_key: config.client_key(),
        }
    }
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("identity_api_key", &self.identity_api_key.is_some())
            .field("client_api_key", &self.client_api_key.is_some())
            .field("client_key", &self.client_key.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    vault: TokenVault,
    keys: ApiKeys,
}

impl HeaderBuilder {
    pub fn new(vault: TokenVault, keys: ApiKeys) -> Self {
        Self { vault, keys }
    }

    /// Adds the selected credentials to `headers` and hands the map back.
    ///
    /// Existing values for the same names are replaced, so applying twice is a no-op.
    pub fn build(&self, mut headers: HeaderMap, flags: HeaderFlags) -> HeaderMap {
        let creds = self.vault.current();
        let token = if flags.use_refresh_token {
            creds.refresh_token
        } else {
            creds.access_token
        };
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            set_header(&mut headers, AUTHORIZATION, &format!("Bearer {token}"));
        }

        if flags.use_api_key {
            set_optional(
                &mut headers,
                HeaderName::from_static(API_KEY_HEADER),
                self.keys.identity_api_key.as_deref(),
            );
        }

        if flags.use_client_api_key {
            set_optional(
                &mut headers,
                HeaderName::from_static(CLIENT_API_KEY_HEADER),
                self.keys.client_api_key.as_deref(),
            );
            set_optional(
                &mut headers,
                HeaderName::from_static(CLIENT_KEY_HEADER),
                self.keys.client_key.as_deref(),
            );
        }

        headers
    }

    /// Applies the credentials to a request under construction.
    pub fn apply_to(
        &self,
        builder: reqwest::RequestBuilder,
        flags: HeaderFlags,
    ) -> reqwest::RequestBuilder {
        builder.headers(self.build(HeaderMap::new(), flags))
    }
}

fn set_optional(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        set_header(headers, name, value);
    }
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(name, value);
        }
        Err(_) => {
            tracing::warn!(header = %name, "skipping header with a value that is not valid ASCII");
        }
    }
}
