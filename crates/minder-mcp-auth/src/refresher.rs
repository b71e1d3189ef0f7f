//! # Token Refresher
//!
//! [`TokenRefresher`] turns whatever bearer token a client presented into an
//! access token the Minder API will accept:
//!
//! ```text
//! inspect ─┬─ valid access token ──────────────────────────────► return as-is
//!          ├─ expired access token ────────────────────────────► TokenExpired
//!          └─ offline token ─► cache ─┬─ hit ─────────────────► cached token
//!                                     └─ miss ─► locate realm
//!                                                 ─► validate realm
//!                                                 ─► exchange ─► cache ─► new token
//! ```
//!
//! One instance is meant to be shared (`Arc<TokenRefresher>`) by every
//! request handler. See [`TokenCache`] for how concurrent refreshes of the
//! same identity collapse into a single exchange.
//!
//! ## Example
//!
//! ```rust,no_run
//! use minder_mcp_auth::{RefresherConfig, TargetConfig, TokenRefresher};
//!
//! # async fn run(token: &str) -> minder_mcp_auth::Result<()> {
//! let refresher = TokenRefresher::new(RefresherConfig::default())?;
//! let target = TargetConfig::new("api.stacklok.com", 443);
//!
//! let access_token = refresher.get_valid_access_token(token, &target).await?;
//! # let _ = access_token;
//! # Ok(())
//! # }
//! ```

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::cache::{TokenCache, hash_token};
use crate::config::{RefresherConfig, TargetConfig};
use crate::error::{CredentialError, Result};
use crate::exchange::TokenExchanger;
use crate::inspector::{self, TokenKind};
use crate::realm::{ChallengeProbe, HttpChallengeProbe, RealmLocator, RealmValidator};

/// Resolves usable access tokens, refreshing offline tokens on demand
#[derive(Debug)]
pub struct TokenRefresher {
    config: RefresherConfig,
    cache: TokenCache,
    locator: RealmLocator,
    validator: RealmValidator,
    exchanger: TokenExchanger,
}

impl TokenRefresher {
    /// Create a refresher that discovers realms over HTTP
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Client`] if an HTTP client cannot be built.
    pub fn new(config: RefresherConfig) -> Result<Self> {
        let probe =
            HttpChallengeProbe::new(&config).map_err(|e| CredentialError::Client(e.to_string()))?;
        Self::with_probe(config, Box::new(probe))
    }

    /// Create a refresher with a custom realm probe
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Client`] if the exchange HTTP client cannot
    /// be built.
    pub fn with_probe(config: RefresherConfig, probe: Box<dyn ChallengeProbe>) -> Result<Self> {
        let exchanger =
            TokenExchanger::new(&config).map_err(|e| CredentialError::Client(e.to_string()))?;

        Ok(Self {
            locator: RealmLocator::new(probe, config.max_challenge_len),
            validator: RealmValidator::new(config.realm_policy.clone()),
            cache: TokenCache::new(),
            exchanger,
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &RefresherConfig {
        &self.config
    }

    /// Return an access token usable against `target`
    ///
    /// - A valid access token is returned unchanged, with no network traffic.
    /// - An offline token is exchanged for an access token, or served from the
    ///   cache while the previous exchange result is still fresh.
    ///
    /// Dropping the returned future cancels any network call in progress.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::NoToken`] / [`CredentialError::TokenMalformed`] for
    ///   unusable input
    /// - [`CredentialError::TokenExpired`] for an access token inside the
    ///   refresh buffer
    /// - [`CredentialError::RealmDiscoveryFailed`],
    ///   [`CredentialError::InvalidRealmUrl`] or
    ///   [`CredentialError::RefreshFailed`] when the exchange cannot happen
    pub async fn get_valid_access_token(
        &self,
        token: &str,
        target: &TargetConfig,
    ) -> Result<String> {
        let buffer = self.config.refresh_buffer;

        match inspector::inspect(token, buffer)? {
            TokenKind::ValidAccess => {
                debug!("token is a valid access token, passing through");
                return Ok(token.to_string());
            }
            TokenKind::ExpiredAccess => return Err(CredentialError::TokenExpired),
            TokenKind::Offline => {}
        }

        let key = hash_token(token);
        if let Some(access_token) = self.cache.get_fresh(&key, buffer) {
            debug!(cache_key = %key, "access token cache hit");
            return Ok(access_token);
        }

        let gate = self.cache.gate(&key);
        let _refreshing = gate.lock().await;

        // Another caller may have refreshed while we waited
        match self.cache.get_fresh(&key, buffer) {
            Some(access_token) => {
                debug!(cache_key = %key, "access token refreshed by concurrent caller");
                Ok(access_token)
            }
            None => self.refresh(token, target, &key).await,
        }
    }

    async fn refresh(&self, token: &str, target: &TargetConfig, key: &str) -> Result<String> {
        debug!(cache_key = %key, target = %target, "access token cache miss, refreshing");

        let realm = self.locator.locate(target).await?;

        let realm_url = match self.validator.validate_resolved(&realm, &target.host).await {
            Ok(url) => url,
            Err(e) => {
                warn!(target = %target, realm = %realm, error = %e, "rejecting untrusted realm URL");
                self.locator.forget(target);
                return Err(e.into());
            }
        };

        let refresh_token = SecretString::new(token.to_string());
        let exchanged = self.exchanger.exchange(&refresh_token, &realm_url).await?;
        let access_token = exchanged.access_token.expose_secret().clone();

        self.cache.insert(key, exchanged);
        info!(cache_key = %key, target = %target, "offline token exchanged for access token");

        Ok(access_token)
    }

    /// Release idle pooled connections
    ///
    /// Requests already in flight complete on their existing connections.
    /// The refresher stays usable; new requests open new connections.
    pub fn close(&self) {
        self.locator.reset_connections();
        if let Err(e) = self.exchanger.reset_connections() {
            warn!(error = %e, "failed to rebuild exchange client, keeping existing pool");
        }
        debug!("released idle connections");
    }

    /// Number of cached access tokens, fresh or stale
    pub fn cached_token_count(&self) -> usize {
        self.cache.len()
    }

    /// Realm discovered for `target`, if any
    pub fn cached_realm(&self, target: &TargetConfig) -> Option<String> {
        self.locator.cached(target)
    }

    /// Forget every cached access token and realm
    pub fn clear(&self) {
        self.cache.clear();
        self.locator.clear();
    }
}
