//! Publish operation and shared request types.

use std::time::Duration;

use tonic::Request;

use crate::config::TopicConfig;
use crate::error::{DomainError, ErrorKind};
use crate::proto::pubsub::{topic_value, PublishRequest};

use super::connection::PubsubGrpc;

/// A value published on, or received from, a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicValue {
    Text(String),
    Binary(Vec<u8>),
}

impl TopicValue {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for TopicValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TopicValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&[u8]> for TopicValue {
    fn from(value: &[u8]) -> Self {
        Self::Binary(value.to_vec())
    }
}

impl From<Vec<u8>> for TopicValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

impl From<TopicValue> for crate::proto::pubsub::TopicValue {
    fn from(value: TopicValue) -> Self {
        let kind = match value {
            TopicValue::Text(text) => topic_value::Kind::Text(text),
            TopicValue::Binary(bytes) => topic_value::Kind::Binary(bytes),
        };
        Self { kind: Some(kind) }
    }
}

/// Result of a publish operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishResult {
    /// Number of payload bytes sent.
    pub payload_size: usize,
}

/// Reject blank cache or topic names before any network attempt.
pub(crate) fn validate_names(cache_name: &str, topic_name: &str) -> Result<(), DomainError> {
    if cache_name.trim().is_empty() {
        return Err(DomainError::invalid_argument("cache name must not be blank"));
    }
    if topic_name.trim().is_empty() {
        return Err(DomainError::invalid_argument("topic name must not be blank"));
    }
    Ok(())
}

/// Send one value on a topic. No retry is attempted.
pub(crate) async fn publish(
    client: &PubsubGrpc,
    config: &TopicConfig,
    cache_name: &str,
    topic_name: &str,
    value: TopicValue,
) -> Result<PublishResult, DomainError> {
    validate_names(cache_name, topic_name)?;

    let payload_size = value.len();
    let request = Request::new(PublishRequest {
        cache_name: cache_name.to_string(),
        topic: topic_name.to_string(),
        value: Some(value.into()),
    });

    // The generated client is cheap to clone and needs `&mut self`.
    let mut client = client.clone();
    // Enforced here rather than through the grpc-timeout header: the channel
    // reports its own expiry as Cancelled.
    tokio::time::timeout(config.request_timeout, client.publish(request))
        .await
        .map_err(|_| deadline_exceeded(config.request_timeout))?
        .map_err(DomainError::from)?;

    Ok(PublishResult { payload_size })
}

fn deadline_exceeded(timeout: Duration) -> DomainError {
    DomainError::new(
        ErrorKind::Timeout,
        format!("publish did not complete within {}ms", timeout.as_millis()),
    )
}
