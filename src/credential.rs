//! Auth token parsing.
//!
//! Two token encodings are accepted:
//! - **Structured**: standard base64 of `{"endpoint": ..., "api_key": ...}`.
//!   Endpoints are derived as `control.<endpoint>` and `cache.<endpoint>`.
//! - **Three-segment**: `header.claims.signature`, where the claims segment is
//!   base64url JSON carrying `c` (cache host) and `cp` (control host). The
//!   whole token is the API key.
//!
//! Parsing is pure; nothing here touches the network.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

use crate::error::DomainError;

/// Error type for credential resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("auth token is empty")]
    EmptyToken,

    #[error("environment variable {0} is unset or blank")]
    EmptyCredential(String),

    #[error("malformed auth token: {0}")]
    BadToken(String),

    #[error("{0} endpoint override cannot be blank")]
    BlankEndpoint(&'static str),
}

impl From<CredentialError> for DomainError {
    fn from(err: CredentialError) -> Self {
        DomainError::invalid_argument(err.to_string()).with_cause(err)
    }
}

/// Resolved API key and service endpoints.
///
/// Immutable once built; the `with_*` overrides return a new value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    api_key: String,
    control_endpoint: String,
    cache_endpoint: String,
}

/// Claims carried in the middle segment of a three-segment token.
#[derive(Deserialize)]
struct SegmentClaims {
    c: String,
    cp: String,
}

/// Body of a structured token.
#[derive(Deserialize)]
struct StructuredToken {
    endpoint: String,
    api_key: String,
}

impl Credential {
    /// Parse an auth token in either supported encoding.
    pub fn from_token(token: &str) -> Result<Self, CredentialError> {
        if token.trim().is_empty() {
            return Err(CredentialError::EmptyToken);
        }
        // The token is used verbatim as the api key, so it is never trimmed.
        if token.trim() != token {
            return Err(CredentialError::BadToken(
                "token has leading or trailing whitespace".into(),
            ));
        }

        if let Some(structured) = decode_structured(token) {
            return Self::new(
                structured.api_key,
                format!("control.{}", structured.endpoint),
                format!("cache.{}", structured.endpoint),
            );
        }

        let claims = decode_segment_claims(token)?;
        Self::new(token.to_string(), claims.cp, claims.c)
    }

    /// Read an auth token from the named environment variable.
    pub fn from_env_var(name: &str) -> Result<Self, CredentialError> {
        match std::env::var(name) {
            Ok(token) if !token.trim().is_empty() => Self::from_token(&token),
            _ => Err(CredentialError::EmptyCredential(name.to_string())),
        }
    }

    fn new(
        api_key: String,
        control_endpoint: String,
        cache_endpoint: String,
    ) -> Result<Self, CredentialError> {
        if api_key.trim().is_empty() {
            return Err(CredentialError::BadToken("api key is empty".into()));
        }
        if control_endpoint.trim().is_empty() || cache_endpoint.trim().is_empty() {
            return Err(CredentialError::BadToken("endpoint is empty".into()));
        }
        Ok(Self {
            api_key,
            control_endpoint,
            cache_endpoint,
        })
    }

    /// Replace the derived control endpoint.
    pub fn with_control_endpoint(
        self,
        endpoint: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(CredentialError::BlankEndpoint("control"));
        }
        Ok(Self {
            control_endpoint: endpoint,
            ..self
        })
    }

    /// Replace the derived cache endpoint.
    pub fn with_cache_endpoint(
        self,
        endpoint: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(CredentialError::BlankEndpoint("cache"));
        }
        Ok(Self {
            cache_endpoint: endpoint,
            ..self
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Host for cache management traffic.
    pub fn control_endpoint(&self) -> &str {
        &self.control_endpoint
    }

    /// Host for cache data and topic traffic.
    pub fn cache_endpoint(&self) -> &str {
        &self.cache_endpoint
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"<redacted>")
            .field("control_endpoint", &self.control_endpoint)
            .field("cache_endpoint", &self.cache_endpoint)
            .finish()
    }
}

fn decode_structured(token: &str) -> Option<StructuredToken> {
    let bytes = STANDARD.decode(token).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn decode_segment_claims(token: &str) -> Result<SegmentClaims, CredentialError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(CredentialError::BadToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let bytes = STANDARD
        .decode(repad_url_safe(segments[1]))
        .map_err(|e| CredentialError::BadToken(format!("claims are not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| CredentialError::BadToken(format!("claims are missing c/cp: {e}")))
}

/// Turn a base64url segment into padded standard base64.
fn repad_url_safe(segment: &str) -> String {
    let mut out: String = segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while out.len() % 4 != 0 {
        out.push('=');
    }
    out
}
