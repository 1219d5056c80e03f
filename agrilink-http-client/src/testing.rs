//! In-memory transport for exercising clients without a network.
//!
//! ```rust
//! use agrilink_http_client::testing::MockTransport;
//! use agrilink_http_client::{RequestOptions, ResilientClient, ServiceConfig};
//! use std::sync::Arc;
//!
//! let transport = Arc::new(MockTransport::new());
//! transport.push_json(200, serde_json::json!({"ok": true}));
//!
//! let client = ResilientClient::with_transport(
//!     ServiceConfig::new("timing", "http://timing"),
//!     transport.clone(),
//! );
//! assert_eq!(transport.request_count(), 0);
//!
//! # tokio_test::block_on(async {
//! let body: serde_json::Value = client.get("/health", RequestOptions::new()).await.unwrap();
//! assert_eq!(body["ok"], true);
//! assert_eq!(transport.request_count(), 1);
//! # });
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::{FailureCause, Transport, TransportRequest, TransportResponse};

/// A scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with a status and raw body.
    Response(u16, Bytes),
    /// Fail the attempt at the transport level.
    Failure(FailureCause),
    /// Never answer; the client's timeout decides.
    Hang,
    /// Answer after a delay.
    Delayed(Duration, Box<MockReply>),
}

/// Transport that replays scripted replies and records every request.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<MockReply>>,
    fallback: Mutex<Option<MockReply>>,
    requests: Mutex<Vec<(Instant, TransportRequest)>>,
    closes: AtomicUsize,
}

impl MockTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply.
    pub fn push(&self, reply: MockReply) -> &Self {
        self.script.lock().push_back(reply);
        self
    }

    /// Queue a status-only reply.
    pub fn push_status(&self, status: u16) -> &Self {
        self.push(MockReply::Response(status, Bytes::new()))
    }

    /// Queue a JSON reply.
    pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push(MockReply::Response(status, Bytes::from(body.to_string())))
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, cause: FailureCause) -> &Self {
        self.push(MockReply::Failure(cause))
    }

    /// Reply used once the script is empty.
    pub fn always(&self, reply: MockReply) -> &Self {
        *self.fallback.lock() = Some(reply);
        self
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Gaps between consecutive requests, measured on the tokio clock.
    pub fn request_gaps(&self) -> Vec<Duration> {
        let requests = self.requests.lock();
        requests
            .windows(2)
            .map(|pair| pair[1].0.duration_since(pair[0].0))
            .collect()
    }

    /// Number of times `close` reached the transport.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> MockReply {
        if let Some(reply) = self.script.lock().pop_front() {
            return reply;
        }
        self.fallback
            .lock()
            .clone()
            .unwrap_or_else(|| MockReply::Failure(FailureCause::Connection("no scripted reply".into())))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, FailureCause> {
        self.requests.lock().push((Instant::now(), request));

        let mut reply = self.next_reply();
        loop {
            match reply {
                MockReply::Response(status, body) => {
                    let status = StatusCode::from_u16(status)
                        .map_err(|e| FailureCause::InvalidRequest(e.to_string()))?;
                    return Ok(TransportResponse::new(status, body));
                }
                MockReply::Failure(cause) => return Err(cause),
                MockReply::Hang => return std::future::pending().await,
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }

    fn close(&self) -> bool {
        self.closes.fetch_add(1, Ordering::SeqCst) == 0
    }
}
