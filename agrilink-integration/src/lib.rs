//! # Agrilink Integration
//!
//! Typed service facades and integration adapters that reach a capability
//! either in-process, over REST, or over REST with an in-process fallback.
//!
//! ## Features
//!
//! - **Service Facades**: Typed request/response wrappers over a [`ResilientClient`](agrilink_http_client::ResilientClient)
//! - **Integration Modes**: `direct_import`, `rest_api` and `hybrid`, fixed per adapter
//! - **Lazy Direct Path**: In-process implementations are built on first use and memoized
//! - **Fallback**: Hybrid adapters return the remote error when the fallback also fails
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agrilink_integration::prelude::*;
//! use agrilink_integration::timing::{FieldActivity, TimingRequest, timing_adapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IntegrationConfig::from_env("AGRILINK_TIMING")?;
//!     let adapter = timing_adapter(
//!         config,
//!         DirectProvider::unavailable("timing", "optimizer not linked"),
//!     )?;
//!
//!     let request = TimingRequest::new("f-12", "maize", FieldActivity::Planting);
//!     let recommendation = adapter.operation(&request).await?;
//!     println!("plant on {}", recommendation.recommended_date);
//!
//!     adapter.close();
//!     Ok(())
//! }
//! ```

mod adapter;
mod direct;
mod error;
mod facade;
mod mode;
mod strategy;

pub mod timing;

pub use adapter::{IntegrationAdapter, IntegrationAdapterBuilder};
pub use direct::{DirectProvider, DirectService};
pub use error::{BoxError, DirectError, IntegrationError, Result};
pub use facade::{Operation, RemoteOperation, ServiceFacade};
pub use mode::{HybridPolicy, IntegrationConfig, IntegrationMode, ParseModeError};
pub use strategy::{
    DirectStrategy, HybridStrategy, IntegrationStrategy, RemoteFacade, RestStrategy,
};

/// Prelude for common imports.
///
/// ```
/// use agrilink_integration::prelude::*;
/// ```
pub mod prelude {
    pub use crate::adapter::IntegrationAdapter;
    pub use crate::direct::{DirectProvider, DirectService};
    pub use crate::error::{DirectError, IntegrationError};
    pub use crate::facade::{Operation, ServiceFacade};
    pub use crate::mode::{HybridPolicy, IntegrationConfig, IntegrationMode};
}
