//! # Refresh Token Exchange
//!
//! Trades an offline token for a short-lived access token using the standard
//! OAuth 2.0 refresh-token grant (RFC 6749 Section 6) against a Keycloak
//! realm's token endpoint:
//!
//! ```text
//! POST <realm>/protocol/openid-connect/token
//! grant_type=refresh_token&refresh_token=...&client_id=minder-cli
//! ```
//!
//! The client is public: no secret is sent and the client id travels in the
//! request body. Callers must have validated the realm URL first.

mod http_client;

use std::time::SystemTime;

use oauth2::basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType};
use oauth2::{AuthType, ClientId, RefreshToken, RequestTokenError, TokenResponse, TokenUrl};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub use http_client::{ExchangeHttpClient, ExchangeHttpError};
pub(crate) use http_client::client_builder;

use crate::config::RefresherConfig;
use crate::inspector;

/// Path segments appended to a realm URL to reach its token endpoint
pub const TOKEN_ENDPOINT_SEGMENTS: [&str; 3] = ["protocol", "openid-connect", "token"];

/// Refresh-token exchange failures
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The refresh token is expired, revoked or otherwise unusable
    #[error("refresh token is expired or revoked; re-authentication required")]
    InvalidGrant {
        /// Provider-supplied detail
        description: Option<String>,
    },

    /// The identity provider does not know the client
    #[error("client authentication failed")]
    InvalidClient,

    /// The client may not use the refresh-token grant
    #[error("client not authorized for this grant type")]
    UnauthorizedClient,

    /// Any other OAuth2 error code
    #[error("identity provider returned error {code}")]
    Provider {
        /// OAuth2 `error` code
        code: String,
        /// OAuth2 `error_description`
        description: Option<String>,
    },

    /// The token endpoint could not be reached
    #[error("token endpoint request failed: {0}")]
    Transport(#[source] ExchangeHttpError),

    /// The token endpoint answered with something other than a token response
    #[error("invalid token endpoint response: {0}")]
    InvalidResponse(String),

    /// The token endpoint URL could not be derived from the realm
    #[error("cannot derive token endpoint from realm {0}")]
    Endpoint(String),
}

impl RefreshError {
    /// Whether the same exchange may succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Provider { code, .. } => {
                matches!(code.as_str(), "temporarily_unavailable" | "server_error")
            }
            _ => false,
        }
    }

    /// Whether the user has to log in again to obtain a new offline token
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Self::InvalidGrant { .. })
    }

    fn from_server_response(response: &BasicErrorResponse) -> Self {
        let description = response.error_description().cloned();
        match response.error() {
            BasicErrorResponseType::InvalidGrant => Self::InvalidGrant { description },
            BasicErrorResponseType::InvalidClient => Self::InvalidClient,
            BasicErrorResponseType::UnauthorizedClient => Self::UnauthorizedClient,
            other => Self::Provider {
                code: other.to_string(),
                description,
            },
        }
    }
}

/// Access token obtained from an exchange
#[derive(Debug)]
pub struct ExchangedToken {
    /// The new access token
    pub access_token: SecretString,
    /// When the access token expires
    pub expires_at: SystemTime,
}

/// Derive `<realm>/protocol/openid-connect/token`
///
/// A trailing slash on the realm is tolerated. Query and fragment are dropped.
///
/// # Errors
///
/// Returns [`RefreshError::Endpoint`] if the realm URL cannot carry a path.
pub fn token_endpoint(realm: &Url) -> Result<Url, RefreshError> {
    let mut url = realm.clone();
    url.set_query(None);
    url.set_fragment(None);

    url.path_segments_mut()
        .map_err(|()| RefreshError::Endpoint(realm.to_string()))?
        .pop_if_empty()
        .extend(TOKEN_ENDPOINT_SEGMENTS);

    Ok(url)
}

/// Performs refresh-token exchanges
#[derive(Debug)]
pub struct TokenExchanger {
    client_id: ClientId,
    config: RefresherConfig,
    http: RwLock<ExchangeHttpClient>,
}

impl TokenExchanger {
    /// Create an exchanger from refresher settings
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(config: &RefresherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client_id: ClientId::new(config.client_id.clone()),
            http: RwLock::new(ExchangeHttpClient::new(config)?),
            config: config.clone(),
        })
    }

    /// Exchange `refresh_token` at the token endpoint of `realm`
    ///
    /// `realm` must already have passed [`RealmValidator`](crate::realm::RealmValidator).
    ///
    /// # Errors
    ///
    /// Returns a [`RefreshError`] classified from the provider's OAuth2 error
    /// code, or describing the transport/parse failure.
    pub async fn exchange(
        &self,
        refresh_token: &SecretString,
        realm: &Url,
    ) -> Result<ExchangedToken, RefreshError> {
        let endpoint = token_endpoint(realm)?;
        debug!(endpoint = %endpoint, "exchanging refresh token");

        let oauth = BasicClient::new(self.client_id.clone())
            .set_token_uri(TokenUrl::from_url(endpoint))
            .set_auth_type(AuthType::RequestBody);

        // Clone out of the lock so close() never waits on an exchange
        let http = self.http.read().clone();
        let refresh_token = RefreshToken::new(refresh_token.expose_secret().clone());

        let response = oauth
            .exchange_refresh_token(&refresh_token)
            .request_async(&http)
            .await
            .map_err(|e| {
                let err = match e {
                    RequestTokenError::ServerResponse(response) => {
                        RefreshError::from_server_response(&response)
                    }
                    RequestTokenError::Request(e) => RefreshError::Transport(e),
                    RequestTokenError::Parse(e, _body) => {
                        RefreshError::InvalidResponse(e.to_string())
                    }
                    RequestTokenError::Other(msg) => RefreshError::InvalidResponse(msg),
                };
                warn!(error = %err, "refresh token exchange failed");
                err
            })?;

        let access_token = response.access_token().secret().clone();
        let now = SystemTime::now();
        let expires_at = response
            .expires_in()
            .and_then(|ttl| now.checked_add(ttl))
            .or_else(|| inspector::expiry_of(&access_token))
            .unwrap_or(now);

        debug!(expires_in = ?response.expires_in(), "refresh token exchanged");

        Ok(ExchangedToken {
            access_token: SecretString::new(access_token),
            expires_at,
        })
    }

    /// Drop pooled connections by swapping in a fresh HTTP client
    ///
    /// Exchanges already in flight keep their own client handle.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the replacement client cannot be built;
    /// the old client stays in place.
    pub fn reset_connections(&self) -> Result<(), reqwest::Error> {
        let fresh = ExchangeHttpClient::new(&self.config)?;
        *self.http.write() = fresh;
        Ok(())
    }
}
