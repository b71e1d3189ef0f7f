//! # Realm Discovery
//!
//! Minder does not publish which Keycloak realm issues its tokens; it names
//! the realm in the `WWW-Authenticate` challenge it returns to unauthenticated
//! requests. The locator sends one deliberately unauthenticated request to a
//! protected endpoint, reads the challenge, and caches the realm per target
//! (`host:port`) for the life of the process.
//!
//! Failed discoveries are never cached, so a later call retries.
//!
//! The realm returned here is *untrusted*: run it through
//! [`RealmValidator`](super::RealmValidator) before using it.

use std::collections::HashMap;
use std::error::Error as StdError;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::StatusCode;
use reqwest::header::WWW_AUTHENTICATE;
use thiserror::Error;
use tracing::{debug, warn};

use crate::challenge::{BearerChallenge, ChallengeError};
use crate::config::{RefresherConfig, TargetConfig};
use crate::exchange::client_builder;

/// Boxed transport error carried by [`DiscoveryError::Probe`]
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Realm discovery errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The probe request itself failed
    #[error("probe request failed: {0}")]
    Probe(#[source] BoxError),

    /// The target's base URL could not be built
    #[error("invalid target {0}")]
    InvalidTarget(String),

    /// The probe was answered with something other than 401
    #[error("expected 401 Unauthorized from probe, got {0}")]
    UnexpectedStatus(u16),

    /// 401 without a challenge header
    #[error("server did not return a www-authenticate header")]
    MissingChallenge,

    /// Challenge present but unusable
    #[error("could not extract realm from www-authenticate header: {0}")]
    MalformedChallenge(String),
}

impl From<ChallengeError> for DiscoveryError {
    fn from(e: ChallengeError) -> Self {
        Self::MalformedChallenge(e.to_string())
    }
}

/// Obtains the raw authentication challenge from a target
///
/// The default [`HttpChallengeProbe`] reads an HTTP `WWW-Authenticate`
/// header. Transports that deliver the challenge as RPC metadata implement
/// this trait instead.
#[async_trait]
pub trait ChallengeProbe: Send + Sync + std::fmt::Debug {
    /// Send one unauthenticated request and return the challenge value
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if the request fails, the target does not
    /// reject it as unauthenticated, or no challenge is attached.
    async fn challenge(&self, target: &TargetConfig) -> Result<String, DiscoveryError>;

    /// Release idle connections. The default does nothing.
    fn reset_connections(&self) {}
}

/// Probes `GET <base_url><probe_path>` over HTTP
#[derive(Debug)]
pub struct HttpChallengeProbe {
    config: RefresherConfig,
    client: RwLock<reqwest::Client>,
}

impl HttpChallengeProbe {
    /// Create a probe from refresher settings
    ///
    /// Redirects are followed up to `max_redirects` times.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(config: &RefresherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: RwLock::new(Self::build_client(config)?),
            config: config.clone(),
        })
    }

    fn build_client(config: &RefresherConfig) -> Result<reqwest::Client, reqwest::Error> {
        client_builder(config)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
    }
}

#[async_trait]
impl ChallengeProbe for HttpChallengeProbe {
    async fn challenge(&self, target: &TargetConfig) -> Result<String, DiscoveryError> {
        let url = target
            .base_url()
            .and_then(|base| base.join(self.config.probe_path.trim_start_matches('/')))
            .map_err(|e| DiscoveryError::InvalidTarget(format!("{target}: {e}")))?;

        let client = self.client.read().clone();
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Probe(Box::new(e)))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Err(DiscoveryError::UnexpectedStatus(response.status().as_u16()));
        }

        let header = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .ok_or(DiscoveryError::MissingChallenge)?;

        header
            .to_str()
            .map(str::to_string)
            .map_err(|e| DiscoveryError::MalformedChallenge(e.to_string()))
    }

    fn reset_connections(&self) {
        match Self::build_client(&self.config) {
            Ok(fresh) => *self.client.write() = fresh,
            Err(e) => warn!(error = %e, "failed to rebuild probe client, keeping existing pool"),
        }
    }
}

/// Discovers and caches realm URLs per target
#[derive(Debug)]
pub struct RealmLocator {
    probe: Box<dyn ChallengeProbe>,
    max_challenge_len: usize,
    realms: RwLock<HashMap<String, String>>,
}

impl RealmLocator {
    /// Create a locator using the given probe
    pub fn new(probe: Box<dyn ChallengeProbe>, max_challenge_len: usize) -> Self {
        Self {
            probe,
            max_challenge_len,
            realms: RwLock::new(HashMap::new()),
        }
    }

    /// Realm URL for `target`, probing on first use
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if the probe fails or the challenge names
    /// no realm. Nothing is cached in that case.
    pub async fn locate(&self, target: &TargetConfig) -> Result<String, DiscoveryError> {
        let key = target.cache_key();

        if let Some(realm) = self.realms.read().get(&key) {
            debug!(target = %key, "realm cache hit");
            return Ok(realm.clone());
        }

        debug!(target = %key, "probing for realm");
        let header = self.probe.challenge(target).await.inspect_err(|e| {
            warn!(target = %key, error = %e, "realm discovery failed");
        })?;

        let challenge = BearerChallenge::parse(&header, self.max_challenge_len)?;
        let realm = challenge
            .realm()
            .ok_or_else(|| DiscoveryError::MalformedChallenge("no realm parameter".to_string()))?
            .to_string();

        debug!(target = %key, realm = %realm, "realm discovered");
        self.realms.write().insert(key, realm.clone());
        Ok(realm)
    }

    /// Cached realm for `target`, without probing
    pub fn cached(&self, target: &TargetConfig) -> Option<String> {
        self.realms.read().get(&target.cache_key()).cloned()
    }

    /// Forget the cached realm for `target`
    pub fn forget(&self, target: &TargetConfig) {
        self.realms.write().remove(&target.cache_key());
    }

    /// Forget every cached realm
    pub fn clear(&self) {
        self.realms.write().clear();
    }

    /// Release idle probe connections
    pub fn reset_connections(&self) {
        self.probe.reset_connections();
    }
}
