//! Integration error types.

use agrilink_config::ConfigError;
use agrilink_http_client::{ClientError, ServiceError, ServiceUnavailableError};
use thiserror::Error;

/// Boxed error returned by in-process implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, IntegrationError>;

/// Failure of the in-process path.
#[derive(Debug, Error)]
pub enum DirectError {
    /// The implementation could not be constructed in this process.
    #[error("not available: {reason}")]
    NotAvailable {
        /// Why construction failed.
        reason: String,
    },

    /// The implementation ran and failed.
    #[error("{0}")]
    Failed(#[source] BoxError),
}

impl DirectError {
    /// Construction failed.
    pub fn not_available(reason: impl Into<String>) -> Self {
        Self::NotAvailable {
            reason: reason.into(),
        }
    }

    /// The call failed with an implementation error.
    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self::Failed(err.into())
    }
}

/// Errors surfaced by an [`IntegrationAdapter`](crate::IntegrationAdapter).
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// Remote call failed after the client's retry policy.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Remote call rejected by an open circuit breaker.
    #[error(transparent)]
    Unavailable(#[from] ServiceUnavailableError),

    /// The in-process implementation could not be constructed.
    #[error("{service}: direct implementation unavailable: {reason}")]
    DirectUnavailable {
        /// Dependency name.
        service: String,
        /// Why construction failed.
        reason: String,
    },

    /// The in-process implementation returned an error.
    #[error("{service}: {source}")]
    Direct {
        /// Dependency name.
        service: String,
        /// Error raised by the implementation.
        #[source]
        source: BoxError,
    },

    /// The adapter was assembled without a piece its mode requires.
    #[error("integration misconfigured: {0}")]
    Configuration(String),

    /// Adapter configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IntegrationError {
    /// Attach a dependency name to a direct-path failure.
    pub fn direct(service: impl Into<String>, err: DirectError) -> Self {
        let service = service.into();
        match err {
            DirectError::NotAvailable { reason } => Self::DirectUnavailable { service, reason },
            DirectError::Failed(source) => Self::Direct { service, source },
        }
    }

    /// Get the remote service error, if that is what this is.
    pub fn as_service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::Service(e) => Some(e),
            _ => None,
        }
    }

    /// Check if this is a circuit breaker fast-fail.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Check if the in-process path produced this error.
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::DirectUnavailable { .. } | Self::Direct { .. })
    }
}

impl From<ClientError> for IntegrationError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Service(e) => Self::Service(e),
            ClientError::Unavailable(e) => Self::Unavailable(e),
        }
    }
}
