// Agrilink - Resilient inter-service communication for agricultural advisory backends
//
// This library bundles the resilient service client, typed service facades,
// and integration adapters that reach a capability in-process, over REST,
// or over REST with an in-process fallback.

// Re-export the client and integration layers
pub use agrilink_http_client::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStats, ClientError, FailureCause,
    RequestOptions, ResilientClient, RetryPolicy, ServiceConfig, ServiceConfigBuilder,
    ServiceError, ServiceUnavailableError,
};
pub use agrilink_integration::{
    DirectError, DirectProvider, DirectService, HybridPolicy, IntegrationAdapter,
    IntegrationConfig, IntegrationError, IntegrationMode, Operation, RemoteOperation,
    ServiceFacade, timing,
};

pub use agrilink_http_client;
pub use agrilink_integration;

// Re-export optional crates
#[cfg(feature = "config")]
pub use agrilink_config;

#[cfg(feature = "log")]
pub use agrilink_log;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ClientError,
        DirectProvider,
        HybridPolicy,
        IntegrationAdapter,
        IntegrationConfig,
        IntegrationError,
        IntegrationMode,
        Operation,
        RequestOptions,
        ResilientClient,
        ServiceConfig,
        ServiceError,
        ServiceFacade,
        ServiceUnavailableError,
        // Timing facade
        timing::{TimingAdapter, TimingRequest, TimingService},
    };
}
