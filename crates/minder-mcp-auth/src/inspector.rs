//! # Token Inspector
//!
//! Offline classification of bearer tokens: is this an offline (refresh)
//! token that must be exchanged, an access token that can be used as-is, or
//! an access token that is about to expire?
//!
//! ## Unverified decoding
//!
//! Claims are decoded **without verifying the token signature**. The Minder
//! server verifies every token it is presented with, so the claims read here
//! only drive local scheduling decisions (exchange now, pass through, or
//! reject early). Nothing in this module may be used to make an authorization
//! decision.
//!
//! ## Claims consulted
//!
//! - `typ`: Keycloak marks offline tokens with `"Offline"`. Such tokens are
//!   always exchanged, whatever their `exp` says.
//! - `exp`: seconds since the Unix epoch (integer or float). A missing or
//!   non-numeric `exp` is treated as "no expiry". A negative `exp` lies
//!   before the epoch and is always stale.
//!
//! Only the payload segment is decoded. The header, and with it the signing
//! algorithm, plays no part in classification.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

use crate::error::{CredentialError, Result};

/// Keycloak `typ` claim value for offline/refresh tokens
pub const OFFLINE_TOKEN_TYPE: &str = "Offline";

/// Classification of a bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Offline/refresh token: exchange before use
    Offline,
    /// Access token that is not close to expiry
    ValidAccess,
    /// Access token within the refresh buffer of its expiry
    ExpiredAccess,
}

#[derive(Debug)]
struct UnverifiedClaims {
    typ: Option<Value>,
    exp: Option<Value>,
}

impl UnverifiedClaims {
    fn is_offline(&self) -> bool {
        self.typ.as_ref().and_then(Value::as_str) == Some(OFFLINE_TOKEN_TYPE)
    }

    fn expires_at(&self) -> Option<SystemTime> {
        let secs = self.exp.as_ref()?.as_f64()?;
        if secs < 0.0 {
            // Before the epoch: long expired
            let before = Duration::try_from_secs_f64(-secs).ok();
            return Some(before.and_then(|d| UNIX_EPOCH.checked_sub(d)).unwrap_or(UNIX_EPOCH));
        }
        let offset = Duration::try_from_secs_f64(secs).ok()?;
        UNIX_EPOCH.checked_add(offset)
    }
}

fn malformed(reason: impl Into<String>) -> CredentialError {
    CredentialError::TokenMalformed(reason.into())
}

/// Decode the payload segment into a claim map
///
/// The header is not consulted, so the signing algorithm never decides
/// whether a token can be classified.
fn decode_claims(token: &str) -> Result<UnverifiedClaims> {
    if token.is_empty() {
        return Err(CredentialError::NoToken);
    }

    let segments: Vec<&str> = token.split('.').collect();
    let [_header, payload, _signature] = segments.as_slice() else {
        return Err(malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| malformed(format!("invalid claims encoding: {e}")))?;
    let mut claims: Map<String, Value> =
        serde_json::from_slice(&bytes).map_err(|e| malformed(format!("invalid claims: {e}")))?;

    Ok(UnverifiedClaims {
        typ: claims.remove("typ"),
        exp: claims.remove("exp"),
    })
}

/// Returns true once `now + buffer` has reached `expires_at`
pub(crate) fn is_stale(expires_at: SystemTime, buffer: Duration) -> bool {
    match SystemTime::now().checked_add(buffer) {
        Some(deadline) => deadline >= expires_at,
        None => true,
    }
}

/// Classify a token without failing on expiry
///
/// # Errors
///
/// - [`CredentialError::NoToken`] for an empty string
/// - [`CredentialError::TokenMalformed`] if the claims cannot be decoded
pub fn classify(token: &str, refresh_buffer: Duration) -> Result<TokenKind> {
    let claims = decode_claims(token)?;

    if claims.is_offline() {
        return Ok(TokenKind::Offline);
    }

    match claims.expires_at() {
        Some(expires_at) if is_stale(expires_at, refresh_buffer) => Ok(TokenKind::ExpiredAccess),
        _ => Ok(TokenKind::ValidAccess),
    }
}

/// Classify a token, rejecting access tokens that are about to expire
///
/// Access tokens are never refreshed here: without a refresh token there is
/// nothing to exchange, so the caller has to supply a fresh token.
///
/// # Errors
///
/// - [`CredentialError::NoToken`] for an empty string
/// - [`CredentialError::TokenMalformed`] if the claims cannot be decoded
/// - [`CredentialError::TokenExpired`] if `now + refresh_buffer >= exp`
pub fn inspect(token: &str, refresh_buffer: Duration) -> Result<TokenKind> {
    match classify(token, refresh_buffer)? {
        TokenKind::ExpiredAccess => Err(CredentialError::TokenExpired),
        kind => Ok(kind),
    }
}

/// Expiry instant encoded in the token's `exp` claim, if any
pub fn expiry_of(token: &str) -> Option<SystemTime> {
    decode_claims(token).ok()?.expires_at()
}
