//! Domain error taxonomy and the transport status classifier.
//!
//! Every failure surfaced by the client is a [`DomainError`]. Transport
//! failures are always routed through [`classify`] so publish, subscribe and
//! any cache operation built on this crate agree on the mapping.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tonic::{Code, Status};

/// Metadata key the service uses to name the limit that was hit.
const LIMIT_METADATA_KEY: &str = "err";

/// Stable, transport-independent error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyExists,
    Authentication,
    BadRequest,
    Cancelled,
    FailedPrecondition,
    InternalServer,
    InvalidArgument,
    LimitExceeded,
    NotFound,
    PermissionDenied,
    Timeout,
    ServerUnavailable,
    Unknown,
    UnknownService,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 14] = [
        Self::AlreadyExists,
        Self::Authentication,
        Self::BadRequest,
        Self::Cancelled,
        Self::FailedPrecondition,
        Self::InternalServer,
        Self::InvalidArgument,
        Self::LimitExceeded,
        Self::NotFound,
        Self::PermissionDenied,
        Self::Timeout,
        Self::ServerUnavailable,
        Self::Unknown,
        Self::UnknownService,
    ];

    /// Machine-readable code. Stable across releases.
    pub fn code(self) -> &'static str {
        match self {
            Self::AlreadyExists => "ALREADY_EXISTS_ERROR",
            Self::Authentication => "AUTHENTICATION_ERROR",
            Self::BadRequest => "BAD_REQUEST_ERROR",
            Self::Cancelled => "CANCELLED_ERROR",
            Self::FailedPrecondition => "FAILED_PRECONDITION_ERROR",
            Self::InternalServer => "INTERNAL_SERVER_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT_ERROR",
            Self::LimitExceeded => "LIMIT_EXCEEDED_ERROR",
            Self::NotFound => "NOT_FOUND_ERROR",
            Self::PermissionDenied => "PERMISSION_ERROR",
            Self::Timeout => "TIMEOUT_ERROR",
            Self::ServerUnavailable => "SERVER_UNAVAILABLE",
            Self::Unknown => "UNKNOWN_ERROR",
            Self::UnknownService => "UNKNOWN_SERVICE_ERROR",
        }
    }

    /// Human remediation hint shown alongside the message.
    pub fn hint(self) -> &'static str {
        match self {
            Self::AlreadyExists => "A resource with this name already exists",
            Self::Authentication => {
                "Invalid authentication credentials; check that the auth token is current"
            }
            Self::BadRequest => "The request was rejected by the service; check the parameters",
            Self::Cancelled => "The request was cancelled before it completed",
            Self::FailedPrecondition => {
                "The system is not in a state required for the operation's execution"
            }
            Self::InternalServer => "The service hit an unexpected error; retry the request",
            Self::InvalidArgument => "Invalid argument passed to the client",
            Self::LimitExceeded => {
                "Request rate, bandwidth, or object size exceeded the limits for this account"
            }
            Self::NotFound => {
                "The requested resource was not found; check that it has been created"
            }
            Self::PermissionDenied => "Insufficient permissions to perform this operation",
            Self::Timeout => {
                "The client's configured timeout was exceeded; consider raising the request timeout"
            }
            Self::ServerUnavailable => "The service was unable to handle the request; retry later",
            Self::Unknown => "Unknown error occurred",
            Self::UnknownService => "The service returned an unknown error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An error surfaced to callers of the client.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct DomainError {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl DomainError {
    /// Create an error with no underlying cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach the low-level error this one was derived from.
    #[must_use]
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn hint(&self) -> &'static str {
        self.kind.hint()
    }

    /// The original low-level error, if any.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// The transport status this error was classified from, if any.
    pub fn transport_status(&self) -> Option<&Status> {
        self.cause()?.downcast_ref::<Status>()
    }
}

impl From<Status> for DomainError {
    fn from(status: Status) -> Self {
        classify_owned(status)
    }
}

/// Map a transport status into a [`DomainError`].
///
/// The status is cloned into the error's cause; use `DomainError::from` when
/// the status is owned.
pub fn classify(status: &Status) -> DomainError {
    classify_owned(status.clone())
}

fn classify_owned(status: Status) -> DomainError {
    let err_metadata = status
        .metadata()
        .get(LIMIT_METADATA_KEY)
        .and_then(|value| value.to_str().ok());
    let (kind, message) = classify_parts(status.code(), status.message(), err_metadata);
    DomainError::new(kind, message).with_cause(status)
}

/// Classify a raw status code, message and optional `err` metadata value.
///
/// Returns the kind and the message to surface. The message is the status
/// message, except for limit errors whose cause could be identified.
pub fn classify_parts(
    code: Code,
    message: &str,
    err_metadata: Option<&str>,
) -> (ErrorKind, String) {
    let kind = match code {
        Code::Aborted | Code::DataLoss | Code::Internal => ErrorKind::InternalServer,
        Code::AlreadyExists => ErrorKind::AlreadyExists,
        Code::Cancelled => ErrorKind::Cancelled,
        Code::DeadlineExceeded => ErrorKind::Timeout,
        Code::FailedPrecondition => ErrorKind::FailedPrecondition,
        Code::InvalidArgument => ErrorKind::InvalidArgument,
        Code::NotFound => ErrorKind::NotFound,
        Code::OutOfRange | Code::Unimplemented => ErrorKind::BadRequest,
        Code::PermissionDenied => ErrorKind::PermissionDenied,
        Code::ResourceExhausted => ErrorKind::LimitExceeded,
        Code::Unauthenticated => ErrorKind::Authentication,
        Code::Unavailable => ErrorKind::ServerUnavailable,
        Code::Unknown => ErrorKind::UnknownService,
        _ => ErrorKind::Unknown,
    };

    let message = if kind == ErrorKind::LimitExceeded {
        limit_exceeded_message(message, err_metadata).to_string()
    } else {
        message.to_string()
    };

    (kind, message)
}

/// The specific limit a `ResourceExhausted` status refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitCause {
    TopicSubscriptions,
    OperationsRate,
    ThroughputRate,
    RequestSize,
    ItemSize,
    ElementSize,
}

impl LimitCause {
    /// Exact `err` metadata values sent by the service.
    fn from_metadata(value: &str) -> Option<Self> {
        match value {
            "topic_subscriptions_limit_exceeded" => Some(Self::TopicSubscriptions),
            "operations_rate_limit_exceeded" => Some(Self::OperationsRate),
            "throughput_rate_limit_exceeded" => Some(Self::ThroughputRate),
            "request_size_limit_exceeded" => Some(Self::RequestSize),
            "item_size_limit_exceeded" => Some(Self::ItemSize),
            "element_size_limit_exceeded" => Some(Self::ElementSize),
            _ => None,
        }
    }

    /// Keyword scan over the status message. Order matters: first match wins.
    fn from_message(message: &str) -> Option<Self> {
        const KEYWORDS: [(&str, LimitCause); 6] = [
            ("subscribers", LimitCause::TopicSubscriptions),
            ("operations", LimitCause::OperationsRate),
            ("throughput", LimitCause::ThroughputRate),
            ("request limit", LimitCause::RequestSize),
            ("item size", LimitCause::ItemSize),
            ("element size", LimitCause::ElementSize),
        ];

        let lowered = message.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, cause)| *cause)
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::TopicSubscriptions => "Topic subscriptions limit exceeded for this account",
            Self::OperationsRate => "Request rate limit exceeded for this account",
            Self::ThroughputRate => "Throughput (bandwidth) limit exceeded for this account",
            Self::RequestSize => "Request size limit exceeded for this account",
            Self::ItemSize => "Item size limit exceeded for this account",
            Self::ElementSize => "Element size limit exceeded for this account",
        }
    }
}

const GENERIC_LIMIT_MESSAGE: &str = "Limit exceeded for this account";

fn limit_exceeded_message(message: &str, err_metadata: Option<&str>) -> &'static str {
    err_metadata
        .and_then(LimitCause::from_metadata)
        .or_else(|| LimitCause::from_message(message))
        .map_or(GENERIC_LIMIT_MESSAGE, LimitCause::message)
}
