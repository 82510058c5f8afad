//! The result of a single remote exchange.

use std::collections::BTreeMap;
use std::fmt;

/// Status metadata of a response that was actually received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// HTTP status code. Zero means the transport saw no valid code.
    pub status: u16,
    /// Response headers, lowercased names.
    pub headers: BTreeMap<String, String>,
}

impl ResponseMeta {
    /// Creates response metadata with the given status and no headers.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Returns true for exactly 200.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Category of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection could not be established or was dropped.
    Connect,
    /// The attempt exceeded the transport timeout.
    Timeout,
    /// The service answered with a non-success status.
    Status,
    /// The response body could not be read or parsed.
    Body,
    /// The request could not be built.
    Request,
    /// Waiting between attempts was interrupted.
    Interrupted,
}

impl TransportErrorKind {
    /// Returns the lowercase kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Status => "status",
            Self::Body => "body",
            Self::Request => "request",
            Self::Interrupted => "interrupted",
        }
    }
}

/// An error reported by the transport for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} error: {message}", .kind.as_str())]
pub struct TransportError {
    /// Failure category.
    pub kind: TransportErrorKind,
    /// Human readable detail.
    pub message: String,
}

impl TransportError {
    /// Creates a transport error.
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// Creates a status error.
    #[must_use]
    pub fn status(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Status, message)
    }

    /// Creates a body error.
    #[must_use]
    pub fn body(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Body, message)
    }

    /// Creates a request-construction error.
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Request, message)
    }

    /// Creates an interruption error.
    #[must_use]
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Interrupted, message)
    }
}

/// Payload, response metadata and error of one attempt.
///
/// A missing `error` does not imply domain success: non-2xx responses may
/// arrive without a transport error, so callers check the status as well.
#[derive(Clone, PartialEq)]
pub struct Outcome<P> {
    /// Decoded payload, if the exchange produced one.
    pub payload: Option<P>,
    /// Response metadata, absent when nothing was received.
    pub response: Option<ResponseMeta>,
    /// Transport error, if any.
    pub error: Option<TransportError>,
}

impl<P> Outcome<P> {
    /// Creates an outcome for a received response without payload.
    #[must_use]
    pub const fn responded(response: ResponseMeta) -> Self {
        Self {
            payload: None,
            response: Some(response),
            error: None,
        }
    }

    /// Creates an outcome for a received status without payload.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::responded(ResponseMeta::new(status))
    }

    /// Creates an outcome for a failure where nothing was received.
    #[must_use]
    pub const fn failed(error: TransportError) -> Self {
        Self {
            payload: None,
            response: None,
            error: Some(error),
        }
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: P) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attaches a transport error.
    #[must_use]
    pub fn with_error(mut self, error: TransportError) -> Self {
        self.error = Some(error);
        self
    }

    /// Returns the status code of the response, if one was received.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// Returns true for a 200 response with no transport error.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.response.as_ref().is_some_and(ResponseMeta::is_ok)
    }

    /// Returns true if the outcome is worth another attempt.
    ///
    /// See [`should_retry`](crate::retry::should_retry).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        crate::retry::should_retry(self.response.as_ref())
    }

    /// Describes the failure for error messages.
    #[must_use]
    pub fn failure_message(&self) -> String {
        match (&self.error, &self.response) {
            (Some(error), _) => error.to_string(),
            (None, Some(response)) => format!("unexpected status {}", response.status),
            (None, None) => "no response received".to_string(),
        }
    }
}

impl<P> fmt::Debug for Outcome<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("has_payload", &self.payload.is_some())
            .field("response", &self.response)
            .field("error", &self.error)
            .finish()
    }
}
