//! Common test utilities for integration tests
//!
//! A single wiremock server plays both the Minder API (answering the realm
//! probe with a Bearer challenge) and the Keycloak realm (answering the
//! refresh-token grant). It listens on 127.0.0.1, which the default realm
//! policy accepts over plain HTTP.

#![allow(dead_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{EncodingKey, Header, encode};
use minder_mcp_auth::{RefresherConfig, TargetConfig, TokenRefresher};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

pub const REALM_PATH: &str = "/realms/test";
pub const TOKEN_PATH: &str = "/realms/test/protocol/openid-connect/token";
pub const PROBE_PATH: &str = "/api/v1/user";

/// Mock Minder API plus identity provider
pub struct MockMinder {
    pub server: MockServer,
}

impl MockMinder {
    /// Start a new mock server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Realm URL served by this mock
    pub fn realm(&self) -> String {
        format!("{}{}", self.server.uri(), REALM_PATH)
    }

    /// Target pointing at this mock over plain HTTP
    pub fn target(&self) -> TargetConfig {
        let addr = self.server.address();
        TargetConfig::new(addr.ip().to_string(), addr.port()).allow_insecure(true)
    }

    /// Probe answers 401 with a challenge naming `realm`
    pub async fn mock_probe_realm(&self, realm: &str, times: impl Into<Times>) {
        Mock::given(method("GET"))
            .and(path(PROBE_PATH))
            .respond_with(ResponseTemplate::new(401).insert_header(
                "www-authenticate",
                format!(r#"Bearer realm="{realm}", error="invalid_token""#).as_str(),
            ))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Probe answers 401 with this mock's own realm
    pub async fn mock_probe(&self, times: impl Into<Times>) {
        let realm = self.realm();
        self.mock_probe_realm(&realm, times).await;
    }

    /// Token endpoint returns `access_token`, exactly `times` times
    pub async fn mock_token_success(&self, access_token: &str, expires_in: u64, times: u64) {
        self.mock_token_response(
            None,
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "token_type": "Bearer",
                "expires_in": expires_in,
            })),
            times,
        )
        .await;
    }

    /// Token endpoint returns an OAuth2 error
    pub async fn mock_token_error(&self, error: &str, description: &str, times: u64) {
        self.mock_token_response(
            None,
            ResponseTemplate::new(400).set_body_json(json!({
                "error": error,
                "error_description": description,
            })),
            times,
        )
        .await;
    }

    /// Token endpoint response, optionally only for one refresh token
    pub async fn mock_token_response(
        &self,
        refresh_token: Option<&str>,
        response: ResponseTemplate,
        times: u64,
    ) {
        let mut mock = Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("client_id=minder-cli"));

        if let Some(token) = refresh_token {
            mock = mock.and(body_string_contains(format!("refresh_token={token}")));
        }

        mock.respond_with(response)
            .expect(times)
            .mount(&self.server)
            .await;
    }
}

/// Seconds since the Unix epoch
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
}

/// Encode a test JWT with custom claims
///
/// Signed with HS256 and a throwaway key: nothing in the crate verifies it.
pub fn generate_test_jwt(claims: serde_json::Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"integration-test-key"),
    )
    .expect("Failed to encode JWT")
}

/// Keycloak-style offline token for `subject`
pub fn offline_token(subject: &str) -> String {
    generate_test_jwt(json!({
        "typ": "Offline",
        "sub": subject,
        "iat": now_secs(),
    }))
}

/// Access token expiring `ttl` from now
pub fn access_token(subject: &str, ttl: Duration) -> String {
    generate_test_jwt(json!({
        "typ": "Bearer",
        "sub": subject,
        "exp": now_secs() + ttl.as_secs(),
    }))
}

/// Access token that expired `ago`
pub fn expired_access_token(subject: &str, ago: Duration) -> String {
    generate_test_jwt(json!({
        "typ": "Bearer",
        "sub": subject,
        "exp": now_secs() - ago.as_secs(),
    }))
}

/// Refresher with default settings
pub fn refresher() -> TokenRefresher {
    TokenRefresher::new(RefresherConfig::default()).expect("Failed to build refresher")
}
