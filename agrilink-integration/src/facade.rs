//! Typed facades over remote capabilities.
//!
//! A facade turns a domain request into a JSON call on a
//! [`ResilientClient`] and decodes the reply. Client errors propagate
//! unchanged so callers can tell a failed call from a fast-fail.

use agrilink_http_client::{ClientError, RequestOptions, ResilientClient};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

/// One typed capability: a request in, a response or an error out.
///
/// Facades, in-process implementations and integration strategies all
/// implement this, each with its own error type.
#[async_trait]
pub trait Operation<Req, Resp>: Send + Sync {
    /// Error produced by this operation.
    type Error: Send;

    /// Run the operation.
    async fn call(&self, request: &Req) -> Result<Resp, Self::Error>;
}

/// A remote operation backed by a resilient client.
#[async_trait]
pub trait ServiceFacade<Req, Resp>: Operation<Req, Resp, Error = ClientError> {
    /// The client this facade calls through.
    fn client(&self) -> &ResilientClient;

    /// Probe the remote dependency.
    async fn health_check(&self) -> bool {
        self.client().health_check().await
    }

    /// Release the client's connection pool.
    fn close(&self) -> bool {
        self.client().close()
    }
}

/// Generic facade that POSTs `Req` as JSON to a fixed path.
pub struct RemoteOperation<Req, Resp> {
    client: Arc<ResilientClient>,
    path: String,
    _marker: PhantomData<fn(&Req) -> Resp>,
}

impl<Req, Resp> RemoteOperation<Req, Resp> {
    /// Bind an operation to a client and path.
    pub fn new(client: Arc<ResilientClient>, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<Req, Resp> std::fmt::Debug for RemoteOperation<Req, Resp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteOperation")
            .field("service", &self.client.service_name())
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl<Req, Resp> Operation<Req, Resp> for RemoteOperation<Req, Resp>
where
    Req: Serialize + Sync,
    Resp: DeserializeOwned + Send,
{
    type Error = ClientError;

    async fn call(&self, request: &Req) -> Result<Resp, ClientError> {
        self.client
            .post(&self.path, request, RequestOptions::new())
            .await
    }
}

impl<Req, Resp> ServiceFacade<Req, Resp> for RemoteOperation<Req, Resp>
where
    Req: Serialize + Sync,
    Resp: DeserializeOwned + Send,
{
    fn client(&self) -> &ResilientClient {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrilink_http_client::ServiceConfig;
    use agrilink_http_client::testing::MockTransport;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct Ping {
        field_id: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pong {
        echoed: String,
    }

    #[tokio::test]
    async fn test_remote_operation_posts_to_fixed_path() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({"echoed": "f-1"}));
        let client = Arc::new(ResilientClient::with_transport(
            ServiceConfig::new("echo", "http://echo"),
            transport.clone(),
        ));

        let op: RemoteOperation<Ping, Pong> = RemoteOperation::new(client, "/api/v1/echo");
        let pong = op
            .call(&Ping {
                field_id: "f-1".into(),
            })
            .await
            .unwrap();

        assert_eq!(pong.echoed, "f-1");
        let request = &transport.requests()[0];
        assert_eq!(request.url.path(), "/api/v1/echo");
        assert_eq!(request.method, agrilink_http_client::Method::POST);
    }

    #[tokio::test]
    async fn test_facade_close_delegates_to_client() {
        let transport = Arc::new(MockTransport::new());
        let client = Arc::new(ResilientClient::with_transport(
            ServiceConfig::new("echo", "http://echo"),
            transport.clone(),
        ));
        let op: RemoteOperation<Ping, Pong> = RemoteOperation::new(client, "/api/v1/echo");

        assert!(ServiceFacade::close(&op));
        assert!(!ServiceFacade::close(&op));
        assert!(!ServiceFacade::health_check(&op).await);
        assert_eq!(transport.close_count(), 1);
    }
}
