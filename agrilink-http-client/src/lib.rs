//! # Agrilink HTTP Client
//!
//! A resilient client for calling one remote service, with retry logic,
//! a circuit breaker and per-attempt timeouts.
//!
//! ## Features
//!
//! - **Retry with Backoff**: Exponential backoff for server errors, timeouts and connection failures
//! - **Circuit Breaker**: Fails fast while a dependency is down, probes it again after a cool-down
//! - **Timeouts**: Per-attempt timeout, overridable per call
//! - **Lazy Connection Pool**: Nothing is opened until the first request; `close` releases it
//! - **Scripted Transport**: `testing::MockTransport`, enabled by the `testing` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agrilink_http_client::{RequestOptions, ResilientClient, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ResilientClient::new(ServiceConfig::new("timing", "http://timing:8080"));
//!
//!     let windows: serde_json::Value = client
//!         .get("/api/v1/timing/windows", RequestOptions::new().query("crop", "maize"))
//!         .await?;
//!
//!     println!("{windows}");
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Tuning Resilience
//!
//! ```rust
//! use agrilink_http_client::{ResilientClient, ServiceConfig};
//! use std::time::Duration;
//!
//! let config = ServiceConfig::builder("timing", "http://timing:8080")
//!     .request_timeout(Duration::from_secs(10))
//!     .max_retries(2)
//!     .retry_delay(Duration::from_millis(250))
//!     .failure_threshold(3)
//!     .open_timeout(Duration::from_secs(30))
//!     .build();
//!
//! let client = ResilientClient::new(config);
//! assert!(client.circuit_breaker().is_some());
//! ```

mod circuit_breaker;
mod client;
mod config;
mod error;
mod request;
mod retry;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStats};
pub use client::ResilientClient;
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{ClientError, FailureCause, Result, ServiceError, ServiceUnavailableError};
pub use request::RequestOptions;
pub use retry::{RetryDecision, RetryPolicy};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, Method, StatusCode};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use agrilink_http_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use crate::client::ResilientClient;
    pub use crate::config::{ServiceConfig, ServiceConfigBuilder};
    pub use crate::error::{ClientError, Result, ServiceError, ServiceUnavailableError};
    pub use crate::request::RequestOptions;
    pub use crate::retry::RetryPolicy;
}
