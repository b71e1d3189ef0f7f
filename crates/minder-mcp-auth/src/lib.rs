//! # Minder MCP Auth - Bearer Token Management
//!
//! Credential handling for an MCP server that proxies requests to the Minder
//! API. Clients hand the server either a short-lived access token or a
//! long-lived Keycloak *offline* token; the Minder API only accepts the
//! former. This crate decides which one it got and, for offline tokens,
//! performs and caches the OAuth 2.0 refresh-token exchange.
//!
//! ## Architecture
//!
//! - [`inspector`] - Offline token classification (offline / valid / expired)
//! - [`challenge`] - `WWW-Authenticate: Bearer` parsing (RFC 6750)
//! - [`realm`] - Realm discovery by probe, and SSRF validation of the result
//! - [`exchange`] - Refresh-token grant against the realm's token endpoint
//! - [`cache`] - Access token cache with per-identity refresh gates
//! - [`refresher`] - [`TokenRefresher`], composing all of the above
//! - [`credentials`] - `authorization` header for outbound calls
//! - [`config`] / [`error`] / [`logging`] - Ambient configuration, errors and logs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use minder_mcp_auth::{BearerCredentials, RefresherConfig, TargetConfig, TokenRefresher};
//!
//! # async fn handle(client_token: &str) -> minder_mcp_auth::Result<()> {
//! let refresher = Arc::new(TokenRefresher::new(RefresherConfig::default())?);
//! let target = TargetConfig::new("api.stacklok.com", 443);
//!
//! let access_token = refresher.get_valid_access_token(client_token, &target).await?;
//! let headers = BearerCredentials::new(access_token).request_metadata()?;
//! # let _ = headers;
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Token claims are read **without signature verification** and only drive
//!   local decisions; the Minder API verifies every token it receives.
//! - The realm URL comes from an unauthenticated response and is validated
//!   before any token is sent to it (see [`realm::validator`]).
//! - Raw tokens are never logged. Cache keys are truncated SHA-256 digests.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cache;
pub mod challenge;
pub mod config;
pub mod credentials;
pub mod error;
pub mod exchange;
pub mod inspector;
pub mod logging;
pub mod realm;
pub mod refresher;

pub use cache::{TokenCache, hash_token};
pub use challenge::{BearerChallenge, BearerErrorCode, ChallengeError};
pub use config::{RefresherConfig, RefresherConfigBuilder, TargetConfig};
pub use credentials::BearerCredentials;
pub use error::{CredentialError, ErrorKind, Result};
pub use exchange::{ExchangedToken, RefreshError, TokenExchanger};
pub use inspector::TokenKind;
pub use realm::{
    ChallengeProbe, DiscoveryError, HttpChallengeProbe, RealmLocator, RealmPolicy,
    RealmValidationError, RealmValidator,
};
pub use refresher::TokenRefresher;
