//! Credentials: durable token storage, the shared vault, request headers and
//! the backend refresh client.

pub mod headers;
pub mod refresh;
pub mod store;
pub mod vault;

pub use headers::{ApiKeys, HeaderBuilder, HeaderFlags};
pub use refresh::{RefreshClient, RefreshError, RefreshErrorKind, RefreshedTokens, TokenRefresher};
pub use store::{FileTokenStore, MemoryTokenStore, StoredCredentials, TokenStore};
pub use vault::TokenVault;
