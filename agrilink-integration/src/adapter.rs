//! Mode-switching integration adapter.

use agrilink_http_client::ResilientClient;
use std::sync::Arc;
use tracing::{debug, info};

use crate::strategy::{
    DirectStrategy, HybridStrategy, IntegrationStrategy, RemoteFacade, RestStrategy,
};
use crate::{
    DirectProvider, HybridPolicy, IntegrationConfig, IntegrationError, IntegrationMode, Result,
    ServiceFacade,
};

type RemoteFactory<Req, Resp> = Box<dyn FnOnce() -> RemoteFacade<Req, Resp> + Send>;

/// Exposes one capability through a mode fixed at construction.
///
/// # Examples
///
/// ```rust,no_run
/// use agrilink_integration::{DirectProvider, IntegrationAdapter, IntegrationMode};
/// use agrilink_integration::timing::{TimingRecommendation, TimingRequest, TimingService};
/// use agrilink_http_client::ServiceConfig;
///
/// # async fn run(request: TimingRequest) -> agrilink_integration::Result<()> {
/// let adapter = IntegrationAdapter::builder(IntegrationMode::Hybrid)
///     .remote(|| TimingService::new(ServiceConfig::new("timing", "http://timing:8080")))
///     .direct(DirectProvider::unavailable("timing", "optimizer not linked"))
///     .build()?;
///
/// let recommendation: TimingRecommendation = adapter.operation(&request).await?;
/// adapter.close();
/// # Ok(())
/// # }
/// ```
pub struct IntegrationAdapter<Req, Resp> {
    strategy: Box<dyn IntegrationStrategy<Req, Resp>>,
}

impl<Req, Resp> IntegrationAdapter<Req, Resp>
where
    Req: Sync + 'static,
    Resp: Send + 'static,
{
    /// Start building an adapter for a mode.
    pub fn builder(mode: IntegrationMode) -> IntegrationAdapterBuilder<Req, Resp> {
        IntegrationAdapterBuilder {
            mode,
            remote: None,
            direct: None,
            policy: HybridPolicy::default(),
        }
    }

    /// Build an adapter from loaded configuration.
    ///
    /// `make_remote` receives the service settings and is only called when
    /// the configured mode uses the remote service.
    pub fn from_config<F, Fac>(
        config: IntegrationConfig,
        make_remote: F,
        direct: DirectProvider<Req, Resp>,
    ) -> Result<Self>
    where
        F: FnOnce(agrilink_http_client::ServiceConfig) -> Fac + Send + 'static,
        Fac: ServiceFacade<Req, Resp> + 'static,
    {
        let policy = config.hybrid_policy();
        let service = config.service;
        Self::builder(config.mode)
            .remote(move || make_remote(service))
            .direct(direct)
            .hybrid_policy(policy)
            .build()
    }

    /// Run the operation through the configured mode.
    pub async fn operation(&self, request: &Req) -> Result<Resp> {
        self.strategy.call(request).await
    }

    /// The mode fixed at construction.
    pub fn mode(&self) -> IntegrationMode {
        self.strategy.mode()
    }

    /// Whether the capability is reachable in this mode.
    pub async fn health_check(&self) -> bool {
        self.strategy.health_check().await
    }

    /// The remote client, if this mode constructed one.
    pub fn remote_client(&self) -> Option<&ResilientClient> {
        self.strategy.client()
    }

    /// Release the remote client's resources.
    ///
    /// Idempotent; a no-op in direct mode. Returns `true` on the call that
    /// released something.
    pub fn close(&self) -> bool {
        let released = self.strategy.close();
        if released {
            info!(mode = %self.mode(), "Integration adapter closed");
        }
        released
    }
}

impl<Req, Resp> std::fmt::Debug for IntegrationAdapter<Req, Resp>
where
    Req: Sync + 'static,
    Resp: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationAdapter")
            .field("mode", &self.mode())
            .field("remote", &self.remote_client())
            .finish()
    }
}

/// Builder for [`IntegrationAdapter`].
pub struct IntegrationAdapterBuilder<Req, Resp> {
    mode: IntegrationMode,
    remote: Option<RemoteFactory<Req, Resp>>,
    direct: Option<DirectProvider<Req, Resp>>,
    policy: HybridPolicy,
}

impl<Req, Resp> IntegrationAdapterBuilder<Req, Resp>
where
    Req: Sync + 'static,
    Resp: Send + 'static,
{
    /// Set the remote facade factory. It is not called in direct mode.
    pub fn remote<F, Fac>(mut self, factory: F) -> Self
    where
        F: FnOnce() -> Fac + Send + 'static,
        Fac: ServiceFacade<Req, Resp> + 'static,
    {
        self.remote = Some(Box::new(move || Arc::new(factory()) as RemoteFacade<Req, Resp>));
        self
    }

    /// Use an already-built remote facade.
    pub fn remote_facade(mut self, facade: RemoteFacade<Req, Resp>) -> Self {
        self.remote = Some(Box::new(move || facade));
        self
    }

    /// Set the in-process provider.
    pub fn direct(mut self, provider: DirectProvider<Req, Resp>) -> Self {
        self.direct = Some(provider);
        self
    }

    /// Set which remote failures trigger the hybrid fallback.
    pub fn hybrid_policy(mut self, policy: HybridPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Select the strategy for the mode.
    pub fn build(self) -> Result<IntegrationAdapter<Req, Resp>> {
        let mode = self.mode;
        let strategy: Box<dyn IntegrationStrategy<Req, Resp>> = match mode {
            IntegrationMode::DirectImport => {
                let direct = self.direct.ok_or_else(|| missing(mode, "direct provider"))?;
                Box::new(DirectStrategy::new(direct))
            }
            IntegrationMode::RestApi => {
                let remote = self.remote.ok_or_else(|| missing(mode, "remote facade"))?;
                Box::new(RestStrategy::new(remote()))
            }
            IntegrationMode::Hybrid => {
                let remote = self.remote.ok_or_else(|| missing(mode, "remote facade"))?;
                let direct = self.direct.ok_or_else(|| missing(mode, "direct provider"))?;
                Box::new(HybridStrategy::new(remote(), direct, self.policy))
            }
        };

        debug!(mode = %mode, "Integration adapter built");
        Ok(IntegrationAdapter { strategy })
    }
}

fn missing(mode: IntegrationMode, what: &str) -> IntegrationError {
    IntegrationError::Configuration(format!("{mode} mode requires a {what}"))
}
