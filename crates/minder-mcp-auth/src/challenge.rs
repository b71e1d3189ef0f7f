//! # Bearer Challenges (RFC 6750)
//!
//! Parsing and rendering of `WWW-Authenticate: Bearer ...` challenges.
//!
//! The Minder API answers unauthenticated requests with a challenge naming the
//! Keycloak realm that issues its tokens:
//!
//! ```text
//! WWW-Authenticate: Bearer realm="https://auth.stacklok.com/realms/stacklok", error="invalid_token"
//! ```
//!
//! The header arrives in a response to an unauthenticated request, so it is
//! attacker-influenced input: values longer than the configured bound are
//! rejected before any parsing work, and parameters other than the ones this
//! crate understands are kept verbatim but never interpreted.
//!
//! ## Usage Example
//!
//! ```rust
//! use minder_mcp_auth::challenge::BearerChallenge;
//!
//! let header = r#"Bearer realm="https://auth.example.com/realms/test", error="invalid_token""#;
//! let challenge = BearerChallenge::parse(header, 2048).unwrap();
//! assert_eq!(challenge.realm(), Some("https://auth.example.com/realms/test"));
//! ```

use std::fmt;

use thiserror::Error;

/// Challenge parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChallengeError {
    /// Header exceeds the parse bound
    #[error("www-authenticate header too long: {len} bytes (max: {max})")]
    TooLong {
        /// Actual length
        len: usize,
        /// Allowed length
        max: usize,
    },

    /// Scheme is not `Bearer`
    #[error("www-authenticate scheme is not Bearer")]
    NotBearer,
}

/// Error codes carried in a Bearer challenge (RFC 6750 Section 3.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BearerErrorCode {
    /// The request is malformed
    InvalidRequest,

    /// The access token provided is expired, revoked, malformed, or invalid
    /// for other reasons.
    InvalidToken,

    /// The request requires higher privileges than provided by the access token.
    InsufficientScope,

    /// Any other code, kept verbatim
    Other(String),
}

impl BearerErrorCode {
    /// Get the error code string per RFC 6750
    pub fn as_str(&self) -> &str {
        match self {
            BearerErrorCode::InvalidRequest => "invalid_request",
            BearerErrorCode::InvalidToken => "invalid_token",
            BearerErrorCode::InsufficientScope => "insufficient_scope",
            BearerErrorCode::Other(code) => code,
        }
    }

    fn from_code(code: &str) -> Self {
        match code {
            "invalid_request" => BearerErrorCode::InvalidRequest,
            "invalid_token" => BearerErrorCode::InvalidToken,
            "insufficient_scope" => BearerErrorCode::InsufficientScope,
            other => BearerErrorCode::Other(other.to_string()),
        }
    }
}

impl fmt::Display for BearerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A `Bearer` authentication challenge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BearerChallenge {
    /// The authentication realm
    realm: Option<String>,

    /// Scopes (space-separated in header)
    scopes: Vec<String>,

    /// Error code (per RFC 6750)
    error: Option<BearerErrorCode>,

    /// Human-readable error description
    error_description: Option<String>,

    /// Parameters this crate does not interpret
    additional_params: Vec<(String, String)>,
}

impl BearerChallenge {
    /// Create a new challenge builder
    pub fn builder() -> BearerChallengeBuilder {
        BearerChallengeBuilder::default()
    }

    /// Parse a `WWW-Authenticate` header value
    ///
    /// Parameter names are matched case-insensitively. Values may be quoted
    /// (with backslash escapes) or bare tokens; commas inside quoted values do
    /// not split parameters. Parameters without `=` are skipped.
    ///
    /// # Errors
    ///
    /// - [`ChallengeError::TooLong`] if `header` is longer than `max_len` bytes
    /// - [`ChallengeError::NotBearer`] if the scheme is not `Bearer`
    pub fn parse(header: &str, max_len: usize) -> Result<Self, ChallengeError> {
        if header.len() > max_len {
            return Err(ChallengeError::TooLong {
                len: header.len(),
                max: max_len,
            });
        }

        let header = header.trim();
        let params = match header.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest,
            None if header.eq_ignore_ascii_case("bearer") => "",
            _ => return Err(ChallengeError::NotBearer),
        };

        let mut challenge = BearerChallenge::default();
        for (key, value) in parse_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" if challenge.realm.is_none() => challenge.realm = Some(value),
                "scope" if challenge.scopes.is_empty() => {
                    challenge.scopes = value.split_whitespace().map(str::to_string).collect();
                }
                "error" if challenge.error.is_none() => {
                    challenge.error = Some(BearerErrorCode::from_code(&value));
                }
                "error_description" if challenge.error_description.is_none() => {
                    challenge.error_description = Some(value);
                }
                _ => challenge.additional_params.push((key, value)),
            }
        }

        Ok(challenge)
    }

    /// Convert to WWW-Authenticate header value
    ///
    /// Produces a header value like:
    /// ```text
    /// Bearer realm="Example", scope="read write", error="invalid_token"
    /// ```
    pub fn to_header_value(&self) -> String {
        let mut parts = Vec::new();

        if let Some(ref realm) = self.realm {
            parts.push(format!("realm=\"{}\"", escape_param_value(realm)));
        }

        if !self.scopes.is_empty() {
            let scope_value = self.scopes.join(" ");
            parts.push(format!("scope=\"{}\"", escape_param_value(&scope_value)));
        }

        if let Some(ref error) = self.error {
            parts.push(format!("error=\"{}\"", escape_param_value(error.as_str())));
        }

        if let Some(ref desc) = self.error_description {
            parts.push(format!(
                "error_description=\"{}\"",
                escape_param_value(desc)
            ));
        }

        for (key, value) in &self.additional_params {
            parts.push(format!("{}=\"{}\"", key, escape_param_value(value)));
        }

        if parts.is_empty() {
            "Bearer".to_string()
        } else {
            format!("Bearer {}", parts.join(", "))
        }
    }

    /// The realm, if present and non-empty
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref().filter(|r| !r.is_empty())
    }

    /// Scopes named by the challenge
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// The error code
    pub fn error(&self) -> Option<&BearerErrorCode> {
        self.error.as_ref()
    }

    /// The error description
    pub fn error_description(&self) -> Option<&str> {
        self.error_description.as_deref()
    }

    /// Look up an uninterpreted parameter by name (case-insensitive)
    pub fn param(&self, name: &str) -> Option<&str> {
        self.additional_params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builder for Bearer challenges
#[derive(Debug, Default)]
pub struct BearerChallengeBuilder {
    challenge: BearerChallenge,
}

impl BearerChallengeBuilder {
    /// Set the authentication realm
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.challenge.realm = Some(realm.into());
        self
    }

    /// Add a scope
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.challenge.scopes.push(scope.into());
        self
    }

    /// Set the error code
    pub fn error(mut self, error: BearerErrorCode) -> Self {
        self.challenge.error = Some(error);
        self
    }

    /// Set the error description (human-readable)
    pub fn error_description(mut self, description: impl Into<String>) -> Self {
        self.challenge.error_description = Some(description.into());
        self
    }

    /// Add a custom auth-param
    pub fn additional_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.challenge
            .additional_params
            .push((key.into(), value.into()));
        self
    }

    /// Build the challenge
    pub fn build(self) -> BearerChallenge {
        self.challenge
    }
}

/// Extract the realm from a `WWW-Authenticate` header value
///
/// Returns `None` for oversized headers, non-Bearer schemes, and challenges
/// without a non-empty realm.
pub fn extract_realm(header: &str, max_len: usize) -> Option<String> {
    BearerChallenge::parse(header, max_len)
        .ok()?
        .realm()
        .map(str::to_string)
}

/// Split `k1="v1", k2=v2` into pairs, honouring quoted strings
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        // Skip separators between parameters
        while chars.peek().is_some_and(|c| *c == ',' || c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' {
                break;
            }
            key.push(c);
            chars.next();
        }

        if chars.next_if_eq(&'=').is_none() {
            // Bare token without a value
            continue;
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
            // Drop anything between the closing quote and the next comma
            while chars.next_if(|c| *c != ',').is_some() {}
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value = value.trim().to_string();
        }

        let key = key.trim();
        if !key.is_empty() {
            params.push((key.to_string(), value));
        }
    }

    params
}

/// Escape special characters in auth-param values
///
/// Quoted-string values need backslash escaping for quotes and backslashes.
fn escape_param_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
