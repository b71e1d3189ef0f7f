//! Error taxonomy for bearer token handling
//!
//! Every failure surfaced by [`TokenRefresher`](crate::TokenRefresher) is a
//! [`CredentialError`]. Each variant corresponds to one category a caller may
//! want to branch on, and [`CredentialError::kind`] exposes that category
//! without matching on message text:
//!
//! | Kind | Meaning | Retry? |
//! |------|---------|--------|
//! | `NoToken` | empty input | no |
//! | `TokenMalformed` | token is not a decodable JWT | no |
//! | `TokenExpired` | access token past the refresh buffer, no refresh token | no |
//! | `RealmDiscoveryFailed` | probe gave no usable challenge, or failed to connect | yes |
//! | `InvalidRealmUrl` | discovered realm failed SSRF validation | no |
//! | `RefreshFailed` | the refresh-token exchange failed | transport errors only |
//!
//! Sub-causes stay attached as [`std::error::Error::source`] so diagnostics
//! can tell "your token is bad" from "the identity provider is unreachable"
//! from "the response we got was untrustworthy".

use thiserror::Error;

use crate::exchange::RefreshError;
use crate::realm::{DiscoveryError, RealmValidationError};

/// Result alias used throughout the crate
pub type Result<T, E = CredentialError> = std::result::Result<T, E>;

/// Error category, stable across message wording changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No token was supplied
    NoToken,
    /// The token could not be decoded
    TokenMalformed,
    /// The access token is expired or about to expire
    TokenExpired,
    /// Realm URL discovery failed
    RealmDiscoveryFailed,
    /// The discovered realm URL is invalid or untrusted
    InvalidRealmUrl,
    /// The refresh-token exchange failed
    RefreshFailed,
    /// The HTTP client could not be constructed
    Client,
}

/// Errors returned while resolving a usable access token
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No token was provided
    #[error("no token provided")]
    NoToken,

    /// The token could not be parsed
    #[error("token is malformed: {0}")]
    TokenMalformed(String),

    /// The access token is expired and there is nothing to refresh it with
    #[error(
        "access token is expired: provide a valid offline/refresh token or a fresh access token"
    )]
    TokenExpired,

    /// The realm URL could not be discovered from the target API
    #[error("realm URL discovery failed: {0}")]
    RealmDiscoveryFailed(#[from] DiscoveryError),

    /// The discovered realm URL failed validation
    #[error("invalid or untrusted realm URL: {0}")]
    InvalidRealmUrl(#[from] RealmValidationError),

    /// The refresh-token exchange failed
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl CredentialError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoToken => ErrorKind::NoToken,
            Self::TokenMalformed(_) => ErrorKind::TokenMalformed,
            Self::TokenExpired => ErrorKind::TokenExpired,
            Self::RealmDiscoveryFailed(_) => ErrorKind::RealmDiscoveryFailed,
            Self::InvalidRealmUrl(_) => ErrorKind::InvalidRealmUrl,
            Self::RefreshFailed(_) => ErrorKind::RefreshFailed,
            Self::Client(_) => ErrorKind::Client,
        }
    }

    /// Whether retrying the same call later can succeed without new input
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RealmDiscoveryFailed(_) => true,
            Self::RefreshFailed(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Whether the caller must supply a different token
    pub fn requires_new_token(&self) -> bool {
        match self {
            Self::NoToken | Self::TokenMalformed(_) | Self::TokenExpired => true,
            Self::RefreshFailed(e) => e.requires_reauthentication(),
            _ => false,
        }
    }
}
