//! Backend token refresh.
//!
//! `POST {backend}/auth/refresh` with `{"venue_identifier": ...}`, authenticated
//! with the stored refresh token and the client keys. The response carries a
//! new token pair but no expiry.

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::headers::{HeaderBuilder, HeaderFlags};
use crate::logging::mask_token;

/// Path of the refresh endpoint relative to the backend base URL.
pub const REFRESH_PATH: &str = "/auth/refresh";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error categories for a failed refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshErrorKind {
    /// Non-2xx response
    HttpStatus,
    /// Request or connect timeout
    Timeout,
    /// Connection refused, DNS failure, TLS errors and similar
    Transport,
    /// Response body missing or malformed
    Parse,
}

impl fmt::Display for RefreshErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshErrorKind::HttpStatus => write!(f, "http_status"),
            RefreshErrorKind::Timeout => write!(f, "timeout"),
            RefreshErrorKind::Transport => write!(f, "transport"),
            RefreshErrorKind::Parse => write!(f, "parse"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshError {
    pub kind: RefreshErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Raw response body, when there was one
    pub details: Option<String>,
}

impl RefreshError {
    pub fn new(kind: RefreshErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, lifting `error`/`message` out of a JSON body.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = (!body.is_empty()).then(|| body.to_string());
        let reason = serde_json::from_str::<Value>(body).ok().and_then(|json| {
            ["message", "error"]
                .iter()
                .find_map(|key| json.get(*key).and_then(Value::as_str).map(str::to_string))
        });
        let message = match reason {
            Some(reason) => format!("HTTP {status}: {reason}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind: RefreshErrorKind::HttpStatus,
            message,
            details,
        }
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RefreshError {}

fn classify_reqwest_error(e: &reqwest::Error) -> RefreshError {
    if e.is_timeout() {
        RefreshError::new(RefreshErrorKind::Timeout, format!("Request timed out: {e}"))
    } else if e.is_decode() {
        RefreshError::new(RefreshErrorKind::Parse, format!("Invalid response: {e}"))
    } else if e.is_connect() {
        RefreshError::new(
            RefreshErrorKind::Transport,
            format!("Connection failed: {e}"),
        )
    } else {
        RefreshError::new(RefreshErrorKind::Transport, format!("Network error: {e}"))
    }
}

/// Token pair returned by the refresh endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("access_token", &mask_token(&self.access_token))
            .field("refresh_token", &mask_token(&self.refresh_token))
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    venue_identifier: &'a str,
}

/// Something that can trade the current refresh token for a new pair.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(&'a self, venue: &'a str) -> BoxFuture<'a, Result<RefreshedTokens, RefreshError>>;
}

/// HTTP client for the backend refresh endpoint.
#[derive(Debug, Clone)]
pub struct RefreshClient {
    http: reqwest::Client,
    url: String,
    headers: HeaderBuilder,
}

impl RefreshClient {
    pub fn new(base_url: &str, headers: HeaderBuilder) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{}{REFRESH_PATH}", base_url.trim_end_matches('/')),
            headers,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, venue: &str) -> Result<RefreshedTokens, RefreshError> {
        let builder = self
            .http
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(&RefreshRequest {
                venue_identifier: venue,
            });
        let response = self
            .headers
            .apply_to(builder, HeaderFlags::default().refresh_token().client_api_key())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefreshError::http_status(status.as_u16(), &body));
        }

        let tokens: RefreshedTokens = response
            .json()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(RefreshError::new(
                RefreshErrorKind::Parse,
                "Refresh response contained an empty token",
            ));
        }

        Ok(tokens)
    }
}

impl TokenRefresher for RefreshClient {
    fn refresh<'a>(&'a self, venue: &'a str) -> BoxFuture<'a, Result<RefreshedTokens, RefreshError>> {
        Box::pin(self.send(venue))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::headers::ApiKeys;
    use crate::auth::store::{MemoryTokenStore, StoredCredentials};
    use crate::auth::vault::TokenVault;

    fn client_for(server: &MockServer) -> RefreshClient {
        let vault = TokenVault::open(Arc::new(MemoryTokenStore::new(StoredCredentials::new(
            "A1", "R1",
        ))))
        .unwrap();
        let keys = ApiKeys {
            identity_api_key: Some("anon".to_string()),
            client_api_key: Some("client-api".to_string()),
            client_key: Some("client-key".to_string()),
        };
        RefreshClient::new(&server.uri(), HeaderBuilder::new(vault, keys))
    }

    #[tokio::test]
    async fn refresh_sends_venue_and_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .and(header("authorization", "Bearer R1"))
            .and(header("x-api-key", "client-api"))
            .and(header("x-client-key", "client-key"))
            .and(body_json(serde_json::json!({"venue_identifier": "north"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "A2",
                "refresh_token": "R2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client_for(&server).refresh("north").await.unwrap();

        assert_eq!(tokens.access_token, "A2");
        assert_eq!(tokens.refresh_token, "R2");
    }

    #[tokio::test]
    async fn http_error_is_classified_with_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"message": "refresh token revoked"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).refresh("north").await.unwrap_err();

        assert_eq!(err.kind, RefreshErrorKind::HttpStatus);
        assert_eq!(err.message, "HTTP 401: refresh token revoked");
        assert!(err.details.unwrap().contains("revoked"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).refresh("north").await.unwrap_err();
        assert_eq!(err.kind, RefreshErrorKind::Parse);
    }

    #[tokio::test]
    async fn empty_token_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "",
                "refresh_token": "R2"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).refresh("north").await.unwrap_err();
        assert_eq!(err.kind, RefreshErrorKind::Parse);
    }

    #[test]
    fn http_status_without_json_keeps_plain_message() {
        let err = RefreshError::http_status(502, "bad gateway");
        assert_eq!(err.to_string(), "HTTP 502");
        assert_eq!(err.details.as_deref(), Some("bad gateway"));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let vault = TokenVault::open(Arc::new(MemoryTokenStore::default())).unwrap();
        let client = RefreshClient::new(
            "http://api.example.com/",
            HeaderBuilder::new(vault, ApiKeys::default()),
        );
        assert_eq!(client.url(), "http://api.example.com/auth/refresh");
    }
}
