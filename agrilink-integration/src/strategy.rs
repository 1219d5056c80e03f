//! Integration strategies, one per mode.

use agrilink_http_client::ResilientClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    DirectProvider, HybridPolicy, IntegrationError, IntegrationMode, Operation, Result,
    ServiceFacade,
};

/// Shared handle to a remote facade.
pub type RemoteFacade<Req, Resp> = Arc<dyn ServiceFacade<Req, Resp>>;

/// How an adapter executes an operation in its mode.
#[async_trait]
pub trait IntegrationStrategy<Req, Resp>: Operation<Req, Resp, Error = IntegrationError> {
    /// The mode this strategy implements.
    fn mode(&self) -> IntegrationMode;

    /// The remote client, if this strategy has one.
    fn client(&self) -> Option<&ResilientClient>;

    /// Whether the capability is currently reachable.
    async fn health_check(&self) -> bool;

    /// Release remote resources. Returns `true` if anything was released.
    fn close(&self) -> bool {
        self.client().is_some_and(ResilientClient::close)
    }
}

/// Runs the in-process implementation only.
pub struct DirectStrategy<Req, Resp> {
    provider: DirectProvider<Req, Resp>,
}

impl<Req, Resp> DirectStrategy<Req, Resp> {
    /// Create a direct strategy.
    pub fn new(provider: DirectProvider<Req, Resp>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<Req, Resp> Operation<Req, Resp> for DirectStrategy<Req, Resp>
where
    Req: Sync + 'static,
    Resp: Send + 'static,
{
    type Error = IntegrationError;

    async fn call(&self, request: &Req) -> Result<Resp> {
        let service = self.provider.name();
        let direct = self
            .provider
            .get()
            .map_err(|e| IntegrationError::direct(service, e))?;
        direct
            .call(request)
            .await
            .map_err(|e| IntegrationError::direct(service, e))
    }
}

#[async_trait]
impl<Req, Resp> IntegrationStrategy<Req, Resp> for DirectStrategy<Req, Resp>
where
    Req: Sync + 'static,
    Resp: Send + 'static,
{
    fn mode(&self) -> IntegrationMode {
        IntegrationMode::DirectImport
    }

    fn client(&self) -> Option<&ResilientClient> {
        None
    }

    async fn health_check(&self) -> bool {
        self.provider.get().is_ok()
    }
}

/// Calls the remote service only; no fallback.
pub struct RestStrategy<Req, Resp> {
    remote: RemoteFacade<Req, Resp>,
}

impl<Req, Resp> RestStrategy<Req, Resp> {
    /// Create a REST strategy.
    pub fn new(remote: RemoteFacade<Req, Resp>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl<Req, Resp> Operation<Req, Resp> for RestStrategy<Req, Resp>
where
    Req: Sync + 'static,
    Resp: Send + 'static,
{
    type Error = IntegrationError;

    async fn call(&self, request: &Req) -> Result<Resp> {
        Ok(self.remote.call(request).await?)
    }
}

#[async_trait]
impl<Req, Resp> IntegrationStrategy<Req, Resp> for RestStrategy<Req, Resp>
where
    Req: Sync + 'static,
    Resp: Send + 'static,
{
    fn mode(&self) -> IntegrationMode {
        IntegrationMode::RestApi
    }

    fn client(&self) -> Option<&ResilientClient> {
        Some(self.remote.client())
    }

    async fn health_check(&self) -> bool {
        self.remote.health_check().await
    }
}

/// Calls the remote service and falls back to the in-process implementation.
///
/// When the fallback cannot be constructed or fails itself, the caller sees
/// the remote error that triggered it.
pub struct HybridStrategy<Req, Resp> {
    remote: RemoteFacade<Req, Resp>,
    direct: DirectProvider<Req, Resp>,
    policy: HybridPolicy,
}

impl<Req, Resp> HybridStrategy<Req, Resp> {
    /// Create a hybrid strategy.
    pub fn new(
        remote: RemoteFacade<Req, Resp>,
        direct: DirectProvider<Req, Resp>,
        policy: HybridPolicy,
    ) -> Self {
        Self {
            remote,
            direct,
            policy,
        }
    }

    /// Fallback policy.
    pub fn policy(&self) -> HybridPolicy {
        self.policy
    }
}

#[async_trait]
impl<Req, Resp> Operation<Req, Resp> for HybridStrategy<Req, Resp>
where
    Req: Sync + 'static,
    Resp: Send + 'static,
{
    type Error = IntegrationError;

    async fn call(&self, request: &Req) -> Result<Resp> {
        let remote_err = match self.remote.call(request).await {
            Ok(response) => return Ok(response),
            Err(err) if self.policy.allows(&err) => err,
            Err(err) => return Err(err.into()),
        };

        let service = self.direct.name();
        warn!(service, error = %remote_err, "Remote call failed, falling back to direct implementation");

        let direct = match self.direct.get() {
            Ok(direct) => direct,
            Err(e) => {
                warn!(service, error = %e, "Fallback unavailable");
                return Err(remote_err.into());
            }
        };

        match direct.call(request).await {
            Ok(response) => {
                info!(service, "Fallback succeeded");
                Ok(response)
            }
            Err(e) => {
                warn!(service, error = %e, "Fallback failed");
                Err(remote_err.into())
            }
        }
    }
}

#[async_trait]
impl<Req, Resp> IntegrationStrategy<Req, Resp> for HybridStrategy<Req, Resp>
where
    Req: Sync + 'static,
    Resp: Send + 'static,
{
    fn mode(&self) -> IntegrationMode {
        IntegrationMode::Hybrid
    }

    fn client(&self) -> Option<&ResilientClient> {
        Some(self.remote.client())
    }

    async fn health_check(&self) -> bool {
        if self.remote.health_check().await {
            return true;
        }
        debug!(service = self.direct.name(), "Remote unhealthy, checking direct implementation");
        self.direct.get().is_ok()
    }
}
