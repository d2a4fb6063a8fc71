//! Channel construction and per-call headers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};

use crate::config::TopicConfig;
use crate::credential::Credential;
use crate::error::DomainError;
use crate::proto::pubsub::pubsub_client::PubsubClient;

const AUTHORIZATION_HEADER: &str = "authorization";
const AGENT_HEADER: &str = "agent";
const AGENT: &str = concat!("cachewire-rust:", env!("CARGO_PKG_VERSION"));

/// Generated pubsub client with auth headers applied to every call.
pub(crate) type PubsubGrpc = PubsubClient<InterceptedService<Channel, HeaderInterceptor>>;

/// Build the pubsub client for the credential's cache endpoint.
///
/// The channel connects lazily, so this performs no network I/O.
pub(crate) fn connect_pubsub(
    credential: &Credential,
    config: &TopicConfig,
) -> Result<PubsubGrpc, DomainError> {
    let channel = build_channel(credential.cache_endpoint(), config)?;
    let interceptor = HeaderInterceptor::new(credential.api_key())?;
    Ok(PubsubClient::new(InterceptedService::new(channel, interceptor)))
}

/// Build a lazily-connected channel to `host`.
///
/// `host` may carry an explicit `http://` or `https://` scheme; bare
/// hostnames get the scheme and port from `config`.
pub(crate) fn build_channel(host: &str, config: &TopicConfig) -> Result<Channel, DomainError> {
    let has_scheme = host.starts_with("http://") || host.starts_with("https://");
    let uri = if has_scheme {
        host.to_string()
    } else {
        format!("{}://{}:{}", config.scheme(), host, config.port)
    };
    let use_tls = uri.starts_with("https://");

    let mut endpoint = Endpoint::from_shared(uri.clone())
        .map_err(|e| {
            DomainError::invalid_argument(format!("invalid endpoint {uri}")).with_cause(e)
        })?
        .connect_timeout(config.connect_timeout)
        .keep_alive_timeout(config.keepalive_timeout)
        .keep_alive_while_idle(config.keepalive_interval.is_some());

    if let Some(interval) = config.keepalive_interval {
        endpoint = endpoint.http2_keep_alive_interval(interval);
    }

    if use_tls {
        let mut tls = match &config.tls_ca {
            Some(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    DomainError::invalid_argument(format!(
                        "failed to read tls ca file: {}",
                        path.display()
                    ))
                    .with_cause(e)
                })?;
                ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem))
            }
            None => ClientTlsConfig::new().with_native_roots(),
        };
        if let Some(domain) = &config.tls_domain {
            tls = tls.domain_name(domain.clone());
        }
        endpoint = endpoint.tls_config(tls).map_err(|e| {
            DomainError::invalid_argument("invalid tls configuration").with_cause(e)
        })?;
    } else if config.tls_ca.is_some() || config.tls_domain.is_some() {
        return Err(DomainError::invalid_argument(
            "TLS settings are only valid with an https endpoint",
        ));
    }

    Ok(endpoint.connect_lazy())
}

/// Adds `authorization` to every call and `agent` to the first one.
///
/// Clones share the first-call flag, so the agent header is sent once per
/// client instance no matter how many handles issue calls.
#[derive(Clone)]
pub struct HeaderInterceptor {
    api_key: MetadataValue<Ascii>,
    agent: MetadataValue<Ascii>,
    agent_sent: Arc<AtomicBool>,
}

impl HeaderInterceptor {
    pub(crate) fn new(api_key: &str) -> Result<Self, DomainError> {
        let mut api_key = MetadataValue::try_from(api_key).map_err(|e| {
            DomainError::invalid_argument("api key is not a valid header value").with_cause(e)
        })?;
        api_key.set_sensitive(true);

        Ok(Self {
            api_key,
            agent: MetadataValue::from_static(AGENT),
            agent_sent: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Interceptor for HeaderInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let metadata = request.metadata_mut();
        metadata.insert(AUTHORIZATION_HEADER, self.api_key.clone());
        if !self.agent_sent.swap(true, Ordering::AcqRel) {
            metadata.insert(AGENT_HEADER, self.agent.clone());
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_on_every_call_agent_once() {
        let mut interceptor = HeaderInterceptor::new("secret").expect("interceptor");
        let mut other_handle = interceptor.clone();

        let first = interceptor.call(Request::new(())).expect("first call");
        assert_eq!(first.metadata().get(AUTHORIZATION_HEADER).unwrap(), "secret");
        assert_eq!(first.metadata().get(AGENT_HEADER).unwrap(), AGENT);

        let second = other_handle.call(Request::new(())).expect("second call");
        assert_eq!(second.metadata().get(AUTHORIZATION_HEADER).unwrap(), "secret");
        assert!(second.metadata().get(AGENT_HEADER).is_none());
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let err = HeaderInterceptor::new("bad\nkey").err().expect("should fail");
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_build_channel_is_lazy() {
        // Nothing listens on this port; a lazy channel must still build.
        let config = TopicConfig::plaintext(1);
        assert!(build_channel("127.0.0.1", &config).is_ok());
        assert!(build_channel("http://127.0.0.1:1", &TopicConfig::default()).is_ok());
    }

    #[test]
    fn test_tls_settings_rejected_for_plaintext() {
        let mut config = TopicConfig::plaintext(1);
        config.tls_domain = Some("example.com".into());
        assert!(build_channel("127.0.0.1", &config).is_err());
    }
}
