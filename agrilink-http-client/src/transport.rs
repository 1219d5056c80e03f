//! Network transport seam.
//!
//! [`ResilientClient`](crate::ResilientClient) owns policy; a [`Transport`]
//! only moves one request and one response. The production transport is
//! [`ReqwestTransport`], whose connection pool is built on first use and
//! released by [`Transport::close`].

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::{FailureCause, ServiceConfig};

/// A fully built request, ready to send.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including query string.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Encoded body.
    pub body: Option<Bytes>,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

/// A received response with its body read to completion.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Body as lossy UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Moves a single request over the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request; no retries.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, FailureCause>;

    /// Release pooled connections. Returns `true` if anything was released.
    fn close(&self) -> bool;
}

/// Transport backed by a lazily built `reqwest::Client`.
pub struct ReqwestTransport {
    user_agent: String,
    pool: Mutex<Option<reqwest::Client>>,
    closed: AtomicBool,
}

impl ReqwestTransport {
    /// Create a transport for the given service; no connections are opened yet.
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            pool: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether the connection pool has been built.
    pub fn is_initialized(&self) -> bool {
        self.pool.lock().is_some()
    }

    fn client(&self) -> Result<reqwest::Client, FailureCause> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FailureCause::Closed);
        }

        let mut pool = self.pool.lock();
        if let Some(client) = pool.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(|e| FailureCause::InvalidRequest(e.to_string()))?;

        debug!(user_agent = %self.user_agent, "Connection pool created");
        *pool = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, FailureCause> {
        let client = self.client()?;
        let timeout = request.timeout;

        let mut builder = client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FailureCause::Timeout(timeout)
            } else {
                FailureCause::from(e)
            }
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }

    fn close(&self) -> bool {
        self.closed.store(true, Ordering::Release);
        let released = self.pool.lock().take().is_some();
        if released {
            debug!("Connection pool released");
        }
        released
    }
}
