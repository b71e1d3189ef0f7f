//! Per-request bearer credentials
//!
//! Attaches an access token to outbound Minder API calls as
//! `authorization: Bearer <token>`.

use http::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CredentialError, Result};

/// Bearer token credentials for outbound API requests
#[derive(Debug, Clone)]
pub struct BearerCredentials {
    token: SecretString,
}

impl BearerCredentials {
    /// Wrap an access token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }

    /// `Bearer <token>`, marked sensitive so it is redacted from debug output
    ///
    /// # Errors
    ///
    /// - [`CredentialError::NoToken`] if the token is empty
    /// - [`CredentialError::TokenMalformed`] if it contains bytes not allowed
    ///   in a header value
    pub fn header_value(&self) -> Result<HeaderValue> {
        let token = self.token.expose_secret();
        if token.is_empty() {
            return Err(CredentialError::NoToken);
        }

        let mut value = HeaderValue::try_from(format!("Bearer {token}")).map_err(|_| {
            CredentialError::TokenMalformed("token is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Request metadata carrying the `authorization` header
    ///
    /// # Errors
    ///
    /// As [`header_value`](Self::header_value).
    pub fn request_metadata(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(AUTHORIZATION, self.header_value()?);
        Ok(headers)
    }

    /// Whether these credentials may only be sent over TLS
    ///
    /// `false`: local Minder servers commonly run without TLS.
    pub fn require_transport_security(&self) -> bool {
        false
    }
}
