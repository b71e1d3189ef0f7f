//! Configuration Types
//!
//! [`TargetConfig`] identifies the protected Minder API instance a token is
//! used against. [`RefresherConfig`] tunes the [`TokenRefresher`](crate::TokenRefresher)
//! itself. Both deserialize with serde so the embedding server can load them
//! from whatever source it already uses.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::realm::RealmPolicy;

/// OAuth2 client ID used for the refresh-token grant
pub const DEFAULT_CLIENT_ID: &str = "minder-cli";

/// How far ahead of expiry a token stops being treated as usable.
///
/// Accounts for network latency, clock skew, and multi-step operations.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(60);

/// Protected endpoint hit by the unauthenticated realm probe
pub const DEFAULT_PROBE_PATH: &str = "/api/v1/user";

/// Upper bound on the `WWW-Authenticate` header length we are willing to parse
pub const DEFAULT_MAX_CHALLENGE_LEN: usize = 2048;

fn default_port() -> u16 {
    443
}

/// Connection parameters of the protected API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Hostname or IP literal of the API server
    pub host: String,
    /// Port of the API server
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use plaintext HTTP instead of TLS (local development only)
    #[serde(default)]
    pub allow_insecure: bool,
}

impl TargetConfig {
    /// Create a TLS target
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            allow_insecure: false,
        }
    }

    /// Toggle plaintext transport
    pub fn allow_insecure(mut self, allow: bool) -> Self {
        self.allow_insecure = allow;
        self
    }

    /// Key under which the discovered realm is cached (`host:port`)
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL scheme implied by the transport setting
    pub fn scheme(&self) -> &'static str {
        if self.allow_insecure { "http" } else { "https" }
    }

    /// Base URL of the API, e.g. `https://api.stacklok.com:443/`
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] if the host is not a valid URL host.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        // IPv6 literals need brackets in the authority component
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        Url::parse(&format!("{}://{}:{}/", self.scheme(), host, self.port))
    }
}

impl fmt::Display for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Token refresher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefresherConfig {
    /// OAuth2 public client ID (no secret is sent)
    pub client_id: String,
    /// Proactive-refresh buffer applied to every expiry check
    pub refresh_buffer: Duration,
    /// Per-request timeout for the probe and the token exchange
    pub request_timeout: Duration,
    /// Redirects the realm probe may follow. The token exchange never follows redirects.
    pub max_redirects: usize,
    /// Idle pooled connections kept per host
    pub pool_max_idle_per_host: usize,
    /// How long an idle pooled connection is kept
    pub pool_idle_timeout: Duration,
    /// Path of the protected endpoint used for realm discovery
    pub probe_path: String,
    /// Longest `WWW-Authenticate` value that will be parsed
    pub max_challenge_len: usize,
    /// User agent sent on outbound requests
    pub user_agent: String,
    /// SSRF rules applied to discovered realm URLs
    pub realm_policy: RealmPolicy,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            request_timeout: Duration::from_secs(30),
            max_redirects: 3,
            pool_max_idle_per_host: 5,
            pool_idle_timeout: Duration::from_secs(90),
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            max_challenge_len: DEFAULT_MAX_CHALLENGE_LEN,
            user_agent: format!("minder-mcp/{}", env!("CARGO_PKG_VERSION")),
            realm_policy: RealmPolicy::default(),
        }
    }
}

impl RefresherConfig {
    /// Create a builder starting from the defaults
    pub fn builder() -> RefresherConfigBuilder {
        RefresherConfigBuilder::default()
    }
}

/// Builder for [`RefresherConfig`]
#[derive(Debug, Default)]
pub struct RefresherConfigBuilder {
    config: RefresherConfig,
}

impl RefresherConfigBuilder {
    /// Set the OAuth2 client ID
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    /// Set the proactive-refresh buffer
    pub fn refresh_buffer(mut self, buffer: Duration) -> Self {
        self.config.refresh_buffer = buffer;
        self
    }

    /// Set the outbound request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set how many redirects the realm probe may follow
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Set the idle connection limit per host
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Set the idle connection timeout
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the probe endpoint path
    pub fn probe_path(mut self, path: impl Into<String>) -> Self {
        self.config.probe_path = path.into();
        self
    }

    /// Set the challenge header length bound
    pub fn max_challenge_len(mut self, len: usize) -> Self {
        self.config.max_challenge_len = len;
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the realm validation policy
    pub fn realm_policy(mut self, policy: RealmPolicy) -> Self {
        self.config.realm_policy = policy;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RefresherConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_cache_key() {
        let target = TargetConfig::new("api.stacklok.com", 443);
        assert_eq!(target.cache_key(), "api.stacklok.com:443");
        assert_eq!(target.to_string(), "api.stacklok.com:443");
    }

    #[test]
    fn test_target_base_url() {
        let target = TargetConfig::new("api.stacklok.com", 8443);
        assert_eq!(
            target.base_url().unwrap().as_str(),
            "https://api.stacklok.com:8443/"
        );

        let local = TargetConfig::new("localhost", 8080).allow_insecure(true);
        assert_eq!(local.base_url().unwrap().as_str(), "http://localhost:8080/");

        let v6 = TargetConfig::new("::1", 8080).allow_insecure(true);
        assert_eq!(v6.base_url().unwrap().as_str(), "http://[::1]:8080/");
    }

    #[test]
    fn test_target_deserialize_defaults() {
        let target: TargetConfig = serde_json::from_str(r#"{"host":"api.stacklok.com"}"#).unwrap();
        assert_eq!(target.port, 443);
        assert!(!target.allow_insecure);
    }

    #[test]
    fn test_refresher_defaults() {
        let config = RefresherConfig::default();
        assert_eq!(config.client_id, "minder-cli");
        assert_eq!(config.refresh_buffer, Duration::from_secs(60));
        assert_eq!(config.max_challenge_len, 2048);
        assert_eq!(config.probe_path, "/api/v1/user");
        assert!(!config.realm_policy.resolve_hostnames);
    }

    #[test]
    fn test_builder_overrides() {
        let config = RefresherConfig::builder()
            .client_id("custom-client")
            .refresh_buffer(Duration::from_secs(120))
            .probe_path("/health")
            .build();

        assert_eq!(config.client_id, "custom-client");
        assert_eq!(config.refresh_buffer, Duration::from_secs(120));
        assert_eq!(config.probe_path, "/health");
        assert_eq!(config.max_redirects, 3);
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: RefresherConfig =
            serde_json::from_str(r#"{"client_id":"from-file"}"#).unwrap();
        assert_eq!(config.client_id, "from-file");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
