//! Service client error types.
//!
//! Exactly two error kinds leave a [`ResilientClient`](crate::ResilientClient):
//! [`ServiceError`] when a request could not be completed under the configured
//! policy, and [`ServiceUnavailableError`] when the circuit breaker rejected it
//! without any network attempt. Lower-level transport failures are carried
//! inside `ServiceError` as a [`FailureCause`].

use std::time::Duration;
use thiserror::Error;

/// Result type for service client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Why a single request attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureCause {
    /// The dependency answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The attempt did not complete within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established or was dropped.
    #[error("connection error: {0}")]
    Connection(String),

    /// The request URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request could not be built (headers, body encoding).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A successful response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The client was closed before the request was issued.
    #[error("client has been closed")]
    Closed,
}

impl FailureCause {
    /// Server errors, timeouts and connection failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Timeout(_) | Self::Connection(_) => true,
            _ => false,
        }
    }

    /// Get the HTTP status code if the dependency answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FailureCause {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(Duration::ZERO)
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// A request failed after the retry policy was exhausted, or failed terminally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service}: request failed after {attempts} attempt(s): {cause}")]
pub struct ServiceError {
    /// Dependency name.
    pub service: String,
    /// Number of network attempts made.
    pub attempts: u32,
    /// Last failure observed.
    #[source]
    pub cause: FailureCause,
}

impl ServiceError {
    /// Create a new service error.
    pub fn new(service: impl Into<String>, attempts: u32, cause: FailureCause) -> Self {
        Self {
            service: service.into(),
            attempts,
            cause,
        }
    }
}

/// The circuit breaker is open; the request was rejected without network I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service}: service unavailable, circuit breaker is open")]
pub struct ServiceUnavailableError {
    /// Dependency name.
    pub service: String,
}

impl ServiceUnavailableError {
    /// Create a new unavailable error.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

/// Errors returned by [`ResilientClient`](crate::ResilientClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Request could not be completed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Circuit breaker rejected the request.
    #[error(transparent)]
    Unavailable(#[from] ServiceUnavailableError),
}

impl ClientError {
    /// Name of the dependency the error belongs to.
    pub fn service(&self) -> &str {
        match self {
            Self::Service(e) => &e.service,
            Self::Unavailable(e) => &e.service,
        }
    }

    /// Check if this is a circuit breaker fast-fail.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Get the underlying failure, if a request was attempted.
    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            Self::Service(e) => Some(&e.cause),
            Self::Unavailable(_) => None,
        }
    }

    /// Get the HTTP status code if the dependency answered.
    pub fn status_code(&self) -> Option<u16> {
        self.cause().and_then(FailureCause::status_code)
    }

    /// Whether a caller with an alternative path should take it.
    ///
    /// Only operational failures qualify; a breaker fast-fail does not.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}
