//! Session and credential core for the backoffice admin console.
//!
//! The session manager keeps a single authoritative session in sync with the
//! identity provider and renews it when it expires. The header builder
//! attaches the persisted credentials to every outgoing API request.

pub mod auth;
pub mod config;
pub mod identity;
pub mod logging;
pub mod session;
