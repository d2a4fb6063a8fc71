//! Client configuration.
//!
//! Supports:
//! - TLS against the service's public endpoints (the default)
//! - Plaintext for local and in-process endpoints
//! - Per-request deadlines for unary calls

use std::path::PathBuf;
use std::time::Duration;

/// Transport settings for a [`TopicClient`](crate::client::TopicClient).
#[derive(Debug, Clone)]
pub struct TopicConfig {
    /// Use TLS when connecting to the cache endpoint
    pub use_tls: bool,

    /// Port the cache endpoint listens on
    pub port: u16,

    /// Timeout for establishing the connection
    pub connect_timeout: Duration,

    /// Deadline applied to each unary call. Subscriptions have no deadline.
    pub request_timeout: Duration,

    /// HTTP/2 keepalive ping interval (None disables keepalive)
    pub keepalive_interval: Option<Duration>,

    /// How long to wait for a keepalive ping acknowledgement
    pub keepalive_timeout: Duration,

    /// CA certificate PEM to trust instead of the platform roots
    pub tls_ca: Option<PathBuf>,

    /// TLS domain name override (SNI)
    pub tls_domain: Option<String>,
}

impl TopicConfig {
    /// Configuration for a plaintext endpoint on the given port.
    pub fn plaintext(port: u16) -> Self {
        Self {
            use_tls: false,
            port,
            ..Self::default()
        }
    }

    /// Override the per-request deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Scheme for URIs built from bare hostnames.
    pub(crate) fn scheme(&self) -> &'static str {
        if self.use_tls {
            "https"
        } else {
            "http"
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            use_tls: true,
            port: 443,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            keepalive_interval: Some(Duration::from_secs(5)),
            keepalive_timeout: Duration::from_secs(1),
            tls_ca: None,
            tls_domain: None,
        }
    }
}
