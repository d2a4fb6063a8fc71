//! Subscription handling for topic streams.
//!
//! A [`Subscription`] owns one server-streaming call. Data frames become
//! [`SubscriptionItem`]s, heartbeats and discontinuities are swallowed, and a
//! transport failure is surfaced as a single classified error after which the
//! subscription is terminated. Nothing here reconnects: resuming is done by
//! opening a new subscription at [`Subscription::resume_sequence_number`].

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::Span;

use crate::error::{DomainError, ErrorKind};
use crate::proto::pubsub::{
    self as proto, subscription_item, topic_value, SubscriptionRequest, TopicItem,
};

use super::connection::PubsubGrpc;
use super::ops::{validate_names, TopicValue};

/// Raw frames as delivered by the Subscribe stream.
pub(crate) type FrameStream = BoxStream<'static, Result<proto::SubscriptionItem, Status>>;

/// A decoded frame, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFrame {
    DataItem { sequence: u64, value: TopicValue },
    Heartbeat,
    Discontinuity { last_sequence: u64, new_sequence: u64 },
    /// A frame this client does not understand.
    Unknown(proto::SubscriptionItem),
}

impl From<proto::SubscriptionItem> for RawFrame {
    fn from(frame: proto::SubscriptionItem) -> Self {
        match frame.kind {
            Some(subscription_item::Kind::Item(TopicItem {
                topic_sequence_number,
                value: Some(proto::TopicValue { kind: Some(kind) }),
            })) => Self::DataItem {
                sequence: topic_sequence_number,
                value: match kind {
                    topic_value::Kind::Text(text) => TopicValue::Text(text),
                    topic_value::Kind::Binary(bytes) => TopicValue::Binary(bytes),
                },
            },
            Some(subscription_item::Kind::Heartbeat(_)) => Self::Heartbeat,
            Some(subscription_item::Kind::Discontinuity(gap)) => Self::Discontinuity {
                last_sequence: gap.last_topic_sequence,
                new_sequence: gap.new_topic_sequence,
            },
            // Missing kind, or an item without a value.
            _ => Self::Unknown(frame),
        }
    }
}

/// An item surfaced to the subscriber.
#[derive(Debug, Clone)]
pub enum SubscriptionItem {
    Text(String),
    Binary(Vec<u8>),
    Error(DomainError),
}

impl SubscriptionItem {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) => Some(text.as_bytes()),
            Self::Binary(bytes) => Some(bytes),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&DomainError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Where a subscription is reading from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionState {
    pub cache_name: String,
    pub topic_name: String,
    /// Highest sequence number delivered so far; pass it back to resume.
    pub resume_sequence_number: u64,
}

impl SubscriptionState {
    fn advance(&mut self, sequence: u64) {
        self.resume_sequence_number = if sequence == 0 {
            self.resume_sequence_number.saturating_add(1)
        } else {
            self.resume_sequence_number.max(sequence)
        };
    }
}

/// Observable lifecycle of a subscription.
///
/// Opening happens inside `subscribe`; a subscription handed to the caller is
/// either streaming or terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPhase {
    Streaming,
    Terminated,
}

enum Inner {
    Streaming(FrameStream),
    /// Opening failed; the error is yielded once, then terminated.
    Failed(DomainError),
    Terminated,
}

enum Polled {
    Cancelled,
    Ended,
    Frame(Result<proto::SubscriptionItem, Status>),
}

/// A handle for an open topic subscription.
///
/// Single consumer: items are pulled with [`next_item`](Self::next_item) or
/// through [`into_stream`](Self::into_stream).
pub struct Subscription {
    /// Cache, topic and resume cursor
    state: SubscriptionState,
    /// Frame stream, pending open error, or nothing once terminated
    inner: Inner,
    /// Child of the owning client's token
    cancel: CancellationToken,
    /// Parent span for this subscription's events
    span: Span,
}

impl Subscription {
    /// Start a new subscription.
    ///
    /// Never fails directly: validation and open errors are delivered as the
    /// first and only item.
    pub(crate) async fn open(
        client: &PubsubGrpc,
        cache_name: &str,
        topic_name: &str,
        resume_sequence_number: u64,
        cancel: CancellationToken,
        parent: &Span,
    ) -> Self {
        let state = SubscriptionState {
            cache_name: cache_name.to_string(),
            topic_name: topic_name.to_string(),
            resume_sequence_number,
        };
        let span = tracing::debug_span!(
            parent: parent,
            "subscription",
            cache = %cache_name,
            topic = %topic_name
        );

        if let Err(err) = validate_names(cache_name, topic_name) {
            return Self::failed(state, err, cancel, span);
        }

        let request = SubscriptionRequest {
            cache_name: state.cache_name.clone(),
            topic: state.topic_name.clone(),
            resume_at_topic_sequence_number: resume_sequence_number,
        };

        let mut client = client.clone();
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Self::failed(state, closed_error(), cancel.clone(), span);
            }
            opened = client.subscribe(request) => opened,
        };

        match opened {
            Ok(response) => {
                tracing::debug!(parent: &span, resume_sequence_number, "subscription streaming");
                Self::from_frames(state, response.into_inner().boxed(), cancel, span)
            }
            Err(status) => {
                let err = DomainError::from(status);
                tracing::warn!(parent: &span, code = err.code(), error = %err, "subscribe failed");
                Self::failed(state, err, cancel, span)
            }
        }
    }

    pub(crate) fn from_frames(
        state: SubscriptionState,
        frames: FrameStream,
        cancel: CancellationToken,
        span: Span,
    ) -> Self {
        Self {
            state,
            inner: Inner::Streaming(frames),
            cancel,
            span,
        }
    }

    fn failed(
        state: SubscriptionState,
        err: DomainError,
        cancel: CancellationToken,
        span: Span,
    ) -> Self {
        Self {
            state,
            inner: Inner::Failed(err),
            cancel,
            span,
        }
    }

    /// Get the next item, returning None once the subscription has terminated.
    pub async fn next_item(&mut self) -> Option<SubscriptionItem> {
        if !matches!(self.inner, Inner::Streaming(_)) {
            return match std::mem::replace(&mut self.inner, Inner::Terminated) {
                Inner::Failed(err) => Some(SubscriptionItem::Error(err)),
                _ => None,
            };
        }

        loop {
            let Inner::Streaming(frames) = &mut self.inner else {
                return None;
            };

            let polled = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Polled::Cancelled,
                frame = frames.next() => frame.map_or(Polled::Ended, Polled::Frame),
            };

            match polled {
                Polled::Cancelled => {
                    self.terminate("closed");
                    return None;
                }
                Polled::Ended => {
                    self.terminate("stream ended");
                    return None;
                }
                Polled::Frame(Err(status)) => {
                    let err = DomainError::from(status);
                    tracing::warn!(
                        parent: &self.span,
                        code = err.code(),
                        error = %err,
                        "subscription failed"
                    );
                    self.terminate("stream error");
                    return Some(SubscriptionItem::Error(err));
                }
                Polled::Frame(Ok(frame)) => {
                    if let Some(item) = self.accept(RawFrame::from(frame)) {
                        return Some(item);
                    }
                }
            }
        }
    }

    /// Filter one frame. Control frames yield nothing.
    fn accept(&mut self, frame: RawFrame) -> Option<SubscriptionItem> {
        match frame {
            RawFrame::DataItem { sequence, value } => {
                self.state.advance(sequence);
                tracing::trace!(
                    parent: &self.span,
                    sequence,
                    resume_sequence_number = self.state.resume_sequence_number,
                    "item received"
                );
                Some(match value {
                    TopicValue::Text(text) => SubscriptionItem::Text(text),
                    TopicValue::Binary(bytes) => SubscriptionItem::Binary(bytes),
                })
            }
            RawFrame::Heartbeat => None,
            RawFrame::Discontinuity {
                last_sequence,
                new_sequence,
            } => {
                // No recovery; the gap is only logged.
                tracing::debug!(parent: &self.span, last_sequence, new_sequence, "discontinuity");
                None
            }
            RawFrame::Unknown(raw) => {
                tracing::warn!(parent: &self.span, frame = ?raw, "unrecognized frame");
                Some(SubscriptionItem::Error(DomainError::new(
                    ErrorKind::Unknown,
                    "received an unrecognized subscription frame",
                )))
            }
        }
    }

    fn terminate(&mut self, reason: &'static str) {
        if !matches!(self.inner, Inner::Terminated) {
            tracing::debug!(
                parent: &self.span,
                reason,
                resume_sequence_number = self.state.resume_sequence_number,
                "subscription terminated"
            );
        }
        self.inner = Inner::Terminated;
    }

    /// Terminate the subscription and release the underlying stream.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.terminate("closed");
    }

    /// A handle that closes this subscription from another task.
    pub fn closer(&self) -> SubscriptionCloser {
        SubscriptionCloser {
            cancel: self.cancel.clone(),
        }
    }

    pub fn phase(&self) -> SubscriptionPhase {
        match self.inner {
            Inner::Streaming(_) if !self.cancel.is_cancelled() => SubscriptionPhase::Streaming,
            _ => SubscriptionPhase::Terminated,
        }
    }

    pub fn state(&self) -> &SubscriptionState {
        &self.state
    }

    /// Sequence number to pass back when resubscribing.
    pub fn resume_sequence_number(&self) -> u64 {
        self.state.resume_sequence_number
    }

    /// Consume the subscription as a `Stream` of items.
    pub fn into_stream(self) -> impl Stream<Item = SubscriptionItem> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            let item = subscription.next_item().await?;
            Some((item, subscription))
        })
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("state", &self.state)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

/// Closes a [`Subscription`] from outside the consuming task.
#[derive(Debug, Clone)]
pub struct SubscriptionCloser {
    cancel: CancellationToken,
}

impl SubscriptionCloser {
    /// The consumer's pending or next `next_item` returns None.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

fn closed_error() -> DomainError {
    DomainError::new(ErrorKind::Cancelled, "subscription was closed before it opened")
}
