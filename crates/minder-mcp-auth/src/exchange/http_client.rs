//! HTTP Client Adapter for OAuth2
//!
//! Bridges reqwest 0.13 to the `oauth2` crate's [`AsyncHttpClient`] trait.
//! `oauth2` 5.0 only implements the trait for its own reqwest 0.12 re-export,
//! so the token exchange goes through this adapter instead.
//!
//! ## Security Configuration
//!
//! The exchange client:
//! - never follows redirects (a redirect could move the refresh token to
//!   another host after realm validation has passed)
//! - uses rustls for TLS
//! - carries the configured request timeout, so a hanging identity provider
//!   cannot hold a refresh gate forever

use std::future::Future;
use std::pin::Pin;

use oauth2::AsyncHttpClient;
use oauth2::http;
use thiserror::Error;

use crate::config::RefresherConfig;

/// Type alias for the HTTP request used by oauth2
pub type HttpRequest = http::Request<Vec<u8>>;
/// Type alias for the HTTP response used by oauth2
pub type HttpResponse = http::Response<Vec<u8>>;

/// Client builder shared by the realm probe and the token exchange
///
/// Redirect policy is left to the caller.
pub(crate) fn client_builder(config: &RefresherConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(Some(config.pool_idle_timeout))
}

/// HTTP client adapter for oauth2 using reqwest 0.13+
#[derive(Clone)]
pub struct ExchangeHttpClient {
    inner: reqwest::Client,
}

impl ExchangeHttpClient {
    /// Create a client from refresher settings, with redirects disabled
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the TLS backend cannot be initialised.
    pub fn new(config: &RefresherConfig) -> Result<Self, reqwest::Error> {
        let inner = client_builder(config)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { inner })
    }

    /// Execute an HTTP request and convert to oauth2 response format
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ExchangeHttpError> {
        let (parts, body) = request.into_parts();

        let response = self
            .inner
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await?;

        let mut builder = http::Response::builder().status(response.status());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(response.headers().clone());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ExchangeHttpError::BodyRead(e.to_string()))?;

        builder
            .body(body.to_vec())
            .map_err(|e| ExchangeHttpError::InvalidResponse(e.to_string()))
    }
}

impl std::fmt::Debug for ExchangeHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeHttpClient")
            .field("inner", &"<reqwest::Client>")
            .finish()
    }
}

/// Error type for HTTP client operations
#[derive(Debug, Error)]
pub enum ExchangeHttpError {
    /// Request execution failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response could not be converted
    #[error("invalid HTTP response: {0}")]
    InvalidResponse(String),

    /// Response body read failed
    #[error("failed to read response body: {0}")]
    BodyRead(String),
}

/// Future type for the OAuth2 HTTP client
pub type ExchangeHttpFuture<'c> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, ExchangeHttpError>> + Send + 'c>>;

impl<'c> AsyncHttpClient<'c> for ExchangeHttpClient {
    type Error = ExchangeHttpError;
    type Future = ExchangeHttpFuture<'c>;

    fn call(&'c self, request: HttpRequest) -> Self::Future {
        Box::pin(async move { self.execute(request).await })
    }
}
