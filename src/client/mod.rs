//! Topic client for the cache pubsub service.
//!
//! [`TopicClient`] owns the resolved [`Credential`] and a lazily-connected
//! channel to the cache endpoint, and exposes publish, subscribe and close.
//! All argument checks run before any network attempt.

mod connection;
mod ops;
mod subscription;

pub use connection::HeaderInterceptor;
pub use ops::{PublishResult, TopicValue};
pub use subscription::{
    RawFrame, Subscription, SubscriptionCloser, SubscriptionItem, SubscriptionPhase,
    SubscriptionState,
};

use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

use crate::config::TopicConfig;
use crate::credential::Credential;
use crate::error::{DomainError, ErrorKind};

use connection::PubsubGrpc;

/// Client for publishing to and subscribing from cache topics.
///
/// Cheap to clone; clones share the channel and the closed state.
#[derive(Clone)]
pub struct TopicClient {
    /// Api key and endpoints
    credential: Credential,
    /// Transport settings, including the per-request deadline
    config: TopicConfig,
    /// Generated client over the shared lazy channel
    pubsub: PubsubGrpc,
    /// Cancelled on close; subscriptions hold child tokens
    closed: CancellationToken,
    /// Injected span all client events are parented on
    span: Span,
}

impl TopicClient {
    pub fn builder(credential: Credential) -> TopicClientBuilder {
        TopicClientBuilder {
            credential,
            config: TopicConfig::default(),
            span: None,
        }
    }

    /// Publish a value on a topic.
    pub async fn publish(
        &self,
        cache_name: &str,
        topic_name: &str,
        value: impl Into<TopicValue>,
    ) -> Result<PublishResult, DomainError> {
        if self.is_closed() {
            return Err(client_closed());
        }

        let value = value.into();
        let result = ops::publish(&self.pubsub, &self.config, cache_name, topic_name, value).await;
        match &result {
            Ok(published) => tracing::debug!(
                parent: &self.span,
                cache = cache_name,
                topic = topic_name,
                payload_size = published.payload_size,
                "published"
            ),
            Err(err) => tracing::warn!(
                parent: &self.span,
                cache = cache_name,
                topic = topic_name,
                code = err.code(),
                error = %err,
                "publish failed"
            ),
        }
        result
    }

    /// Subscribe to a topic from the live tail.
    pub async fn subscribe(&self, cache_name: &str, topic_name: &str) -> Subscription {
        self.subscribe_from(cache_name, topic_name, 0).await
    }

    /// Subscribe to a topic, resuming after `resume_sequence_number`.
    ///
    /// Failures to open are delivered as the subscription's only item.
    pub async fn subscribe_from(
        &self,
        cache_name: &str,
        topic_name: &str,
        resume_sequence_number: u64,
    ) -> Subscription {
        Subscription::open(
            &self.pubsub,
            cache_name,
            topic_name,
            resume_sequence_number,
            self.closed.child_token(),
            &self.span,
        )
        .await
    }

    /// Close the client and every subscription it opened.
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            tracing::debug!(parent: &self.span, "closing topic client");
        }
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn config(&self) -> &TopicConfig {
        &self.config
    }
}

impl std::fmt::Debug for TopicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicClient")
            .field("credential", &self.credential)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Builder for [`TopicClient`].
pub struct TopicClientBuilder {
    credential: Credential,
    config: TopicConfig,
    span: Option<Span>,
}

impl TopicClientBuilder {
    #[must_use]
    pub fn config(mut self, config: TopicConfig) -> Self {
        self.config = config;
        self
    }

    /// Span every event of this client is recorded under.
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build the client. Must be called inside a Tokio runtime; no
    /// connection is attempted until the first call.
    pub fn build(self) -> Result<TopicClient, DomainError> {
        let span = self.span.unwrap_or_else(|| {
            tracing::info_span!(
                "topic_client",
                client_id = %Uuid::now_v7(),
                endpoint = %self.credential.cache_endpoint()
            )
        });
        let pubsub = connection::connect_pubsub(&self.credential, &self.config)?;

        Ok(TopicClient {
            credential: self.credential,
            config: self.config,
            pubsub,
            closed: CancellationToken::new(),
            span,
        })
    }
}

fn client_closed() -> DomainError {
    DomainError::new(ErrorKind::Cancelled, "topic client has been closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    /// A client pointed at a port nothing listens on. Any call that reaches
    /// the network fails with ServerUnavailable, not InvalidArgument.
    fn unreachable_client() -> TopicClient {
        let token = STANDARD.encode(r#"{"endpoint":"example.com","api_key":"key"}"#);
        let credential = Credential::from_token(&token)
            .and_then(|c| c.with_cache_endpoint("127.0.0.1"))
            .expect("credential");
        TopicClient::builder(credential)
            .config(TopicConfig::plaintext(1))
            .build()
            .expect("build")
    }

    async fn only_item(mut subscription: Subscription) -> SubscriptionItem {
        let item = subscription.next_item().await.expect("one item");
        assert!(subscription.next_item().await.is_none());
        item
    }

    #[tokio::test]
    async fn test_blank_names_fail_without_network() {
        let client = unreachable_client();

        for (cache, topic) in [("", "topic"), ("cache", ""), ("  ", "topic")] {
            let item = only_item(client.subscribe(cache, topic).await).await;
            assert_eq!(
                item.error().map(DomainError::kind),
                Some(ErrorKind::InvalidArgument)
            );

            let err = client.publish(cache, topic, "hello").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[tokio::test]
    async fn test_closed_client_rejects_calls() {
        let client = unreachable_client();
        let clone = client.clone();
        client.close();
        client.close();
        assert!(clone.is_closed());

        let err = clone.publish("cache", "topic", "hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let item = only_item(clone.subscribe("cache", "topic").await).await;
        assert_eq!(item.error().map(DomainError::kind), Some(ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_header_key() {
        let token = STANDARD.encode("{\"endpoint\":\"example.com\",\"api_key\":\"k\\ney\"}");
        let credential = Credential::from_token(&token).expect("credential");
        let err = TopicClient::builder(credential)
            .config(TopicConfig::plaintext(1))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
