//! Integration tests for the resilient client's retry, circuit breaker and
//! timeout behavior.
//!
//! These run against the in-memory transport on a paused tokio clock, so
//! backoff and cool-down periods are observed exactly without waiting.

use agrilink_http_client::testing::{MockReply, MockTransport};
use agrilink_http_client::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

fn client_with(config: ServiceConfig) -> (ResilientClient, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let client = ResilientClient::with_transport(config, transport.clone());
    (client, transport)
}

fn fragile(threshold: u32) -> ServiceConfig {
    ServiceConfig::builder("timing", "http://timing")
        .max_retries(0)
        .failure_threshold(threshold)
        .open_timeout(Duration::from_secs(60))
        .build()
}

// =============================================================================
// Success Path Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_get_decodes_json_and_sends_query() {
    let (client, transport) = client_with(ServiceConfig::new("timing", "http://timing"));
    transport.push_json(200, json!({"windows": [1, 2]}));

    let body: Value = client
        .get(
            "/api/v1/timing/windows",
            RequestOptions::new().query("crop", "maize").query("region", "rift"),
        )
        .await
        .unwrap();

    assert_eq!(body["windows"], json!([1, 2]));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(
        requests[0].url.as_str(),
        "http://timing/api/v1/timing/windows?crop=maize&region=rift"
    );
    assert_eq!(requests[0].headers["accept"], "application/json");
    assert!(requests[0].body.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_post_sends_json_body() {
    let (client, transport) = client_with(ServiceConfig::new("timing", "http://timing"));
    transport.push_json(201, json!({"id": "rec-1"}));

    let body: Value = client
        .post(
            "/api/v1/timing/optimize",
            &json!({"field_id": "f-9"}),
            RequestOptions::new().header("x-request-id", "req-42"),
        )
        .await
        .unwrap();

    assert_eq!(body["id"], "rec-1");

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.headers["content-type"], "application/json");
    assert_eq!(request.headers["x-request-id"], "req-42");
    let sent: Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
    assert_eq!(sent, json!({"field_id": "f-9"}));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_success_body_is_decode_error() {
    let (client, transport) = client_with(ServiceConfig::new("timing", "http://timing"));
    transport.push(MockReply::Response(200, Bytes::from_static(b"<html>")));

    let err = client
        .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err.cause(), Some(FailureCause::Decode(_))));
    assert_eq!(transport.request_count(), 1);
}

// =============================================================================
// Retry Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_retries_with_exponential_backoff() {
    let config = ServiceConfig::builder("timing", "http://timing")
        .max_retries(2)
        .retry_delay(Duration::from_secs(1))
        .build();
    let (client, transport) = client_with(config);
    transport.always(MockReply::Response(503, Bytes::from_static(b"busy")));

    let err = client
        .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(transport.request_count(), 3);
    let gaps = transport.request_gaps();
    assert!(gaps[0] >= Duration::from_secs(1) && gaps[0] < Duration::from_millis(1100));
    assert!(gaps[1] >= Duration::from_secs(2) && gaps[1] < Duration::from_millis(2100));

    match err {
        ClientError::Service(e) => {
            assert_eq!(e.attempts, 3);
            assert_eq!(e.cause.status_code(), Some(503));
        }
        other => panic!("expected service error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_after_transient_failure() {
    let (client, transport) = client_with(ServiceConfig::new("timing", "http://timing"));
    transport
        .push_failure(FailureCause::Connection("reset".into()))
        .push_status(502)
        .push_json(200, json!({"ok": true}));

    let body: Value = client
        .get("/api/v1/timing/windows", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(body["ok"], true);
    assert_eq!(transport.request_count(), 3);
    let cb = client.circuit_breaker().unwrap();
    assert_eq!(cb.failure_count(), 0);
    assert_eq!(cb.stats().total_successes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_is_not_retried() {
    let (client, transport) = client_with(ServiceConfig::new("timing", "http://timing"));
    transport.always(MockReply::Response(404, Bytes::from_static(b"no such field")));

    let err = client
        .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(transport.request_count(), 1);
    assert_eq!(err.status_code(), Some(404));

    let stats = client.circuit_breaker().unwrap().stats();
    assert_eq!(stats.failure_count, 0);
    assert_eq!(stats.total_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout() {
    let config = ServiceConfig::builder("timing", "http://timing")
        .request_timeout(Duration::from_secs(5))
        .max_retries(1)
        .retry_delay(Duration::from_millis(100))
        .build();
    let (client, transport) = client_with(config);
    transport.always(MockReply::Hang);

    let started = tokio::time::Instant::now();
    let err = client
        .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(transport.request_count(), 2);
    assert_eq!(err.cause(), Some(&FailureCause::Timeout(Duration::from_secs(5))));
    assert!(started.elapsed() >= Duration::from_millis(10_100));
}

#[tokio::test(start_paused = true)]
async fn test_per_call_timeout_override() {
    let (client, transport) = client_with(fragile(5));
    transport.push(MockReply::Delayed(
        Duration::from_secs(3),
        Box::new(MockReply::Response(200, Bytes::from_static(b"{}"))),
    ));

    let err = client
        .get::<Value>(
            "/api/v1/timing/windows",
            RequestOptions::new().timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.cause(), Some(&FailureCause::Timeout(Duration::from_secs(1))));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_call_stops_retrying_during_backoff() {
    let config = ServiceConfig::builder("timing", "http://timing")
        .max_retries(3)
        .retry_delay(Duration::from_secs(1))
        .failure_threshold(1)
        .build();
    let (client, transport) = client_with(config);
    transport.always(MockReply::Response(503, Bytes::from_static(b"busy")));

    // Attempts at 0s and 1s; dropped during the 2s backoff that follows.
    let call = client.get::<Value>("/api/v1/timing/windows", RequestOptions::new());
    assert!(tokio::time::timeout(Duration::from_millis(1500), call).await.is_err());
    assert_eq!(transport.request_count(), 2);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(transport.request_count(), 2);

    let stats = client.circuit_breaker().unwrap().stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.total_failures, 0);
    assert_eq!(stats.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_call_mid_attempt_leaves_breaker_untouched() {
    let (client, transport) = client_with(fragile(1));
    transport.always(MockReply::Hang);

    let call = client.get::<Value>("/api/v1/timing/windows", RequestOptions::new());
    assert!(tokio::time::timeout(Duration::from_secs(1), call).await.is_err());
    assert_eq!(transport.request_count(), 1);

    let stats = client.circuit_breaker().unwrap().stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.total_failures, 0);
    assert_eq!(stats.total_successes, 0);
}

// =============================================================================
// Circuit Breaker Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_open_circuit_fails_fast_without_requests() {
    let (client, transport) = client_with(fragile(3));
    transport.always(MockReply::Response(502, Bytes::new()));

    for _ in 0..3 {
        let err = client
            .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(!err.is_unavailable());
    }
    assert_eq!(client.circuit_breaker().unwrap().state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(1)).await;

    let err = client
        .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_unavailable());
    assert_eq!(err.service(), "timing");
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_circuit_recovers_after_open_timeout() {
    let (client, transport) = client_with(fragile(2));
    transport.push_status(500).push_status(500);

    for _ in 0..2 {
        let _ = client
            .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
            .await;
    }
    let cb = client.circuit_breaker().unwrap().clone();
    assert_eq!(cb.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(61)).await;
    transport.push_json(200, json!({}));

    let body: Value = client
        .get("/api/v1/timing/windows", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(body, json!({}));
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_reopens_circuit() {
    let (client, transport) = client_with(fragile(1));
    transport.always(MockReply::Response(503, Bytes::new()));

    let _ = client
        .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
        .await;
    tokio::time::advance(Duration::from_secs(61)).await;

    let err = client
        .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
        .await
        .unwrap_err();
    assert!(!err.is_unavailable());

    let err = client
        .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shared_breaker_across_clients() {
    let breaker = Arc::new(CircuitBreaker::new(
        "timing",
        CircuitBreakerConfig::new(2, Duration::from_secs(60)),
    ));

    let (first, first_transport) = client_with(fragile(5));
    let first = first.with_circuit_breaker(breaker.clone());
    let (second, second_transport) = client_with(fragile(5));
    let second = second.with_circuit_breaker(breaker.clone());

    first_transport.always(MockReply::Response(500, Bytes::new()));
    for _ in 0..2 {
        let _ = first.get::<Value>("/a", RequestOptions::new()).await;
    }

    let err = second.get::<Value>("/b", RequestOptions::new()).await.unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(second_transport.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_disabled_never_fails_fast() {
    let config = ServiceConfig::builder("timing", "http://timing")
        .max_retries(0)
        .failure_threshold(1)
        .circuit_breaker_enabled(false)
        .build();
    let (client, transport) = client_with(config);
    transport.always(MockReply::Response(500, Bytes::new()));

    for _ in 0..4 {
        let err = client
            .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(!err.is_unavailable());
    }
    assert_eq!(transport.request_count(), 4);
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_health_check_reports_status() {
    let config = ServiceConfig::builder("timing", "http://timing/")
        .health_check_path("/healthz")
        .build();
    let (client, transport) = client_with(config);
    transport
        .push_status(200)
        .push_status(503)
        .push_failure(FailureCause::Connection("refused".into()));

    assert!(client.health_check().await);
    assert!(!client.health_check().await);
    assert!(!client.health_check().await);

    assert_eq!(transport.requests()[0].url.as_str(), "http://timing/healthz");
    // Probes never feed the breaker.
    assert_eq!(client.circuit_breaker().unwrap().stats().total_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_false_while_circuit_open() {
    let (client, transport) = client_with(fragile(1));
    transport.push_status(500);
    let _ = client.get::<Value>("/x", RequestOptions::new()).await;

    transport.always(MockReply::Response(200, Bytes::new()));
    assert!(!client.health_check().await);
    assert_eq!(transport.request_count(), 1);
}

// =============================================================================
// Close Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_close_is_idempotent() {
    let (client, transport) = client_with(ServiceConfig::new("timing", "http://timing"));

    assert!(client.close());
    assert!(!client.close());
    assert!(client.is_closed());
    assert_eq!(transport.close_count(), 1);

    let err = client
        .get::<Value>("/api/v1/timing/windows", RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.cause(), Some(&FailureCause::Closed));
    assert!(!client.health_check().await);
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_unused_client_opens_no_connections() {
    let transport = Arc::new(ReqwestTransport::new(&ServiceConfig::default()));
    let client = ResilientClient::with_transport(ServiceConfig::default(), transport.clone());

    assert!(!transport.is_initialized());
    assert!(client.close());
    assert!(!transport.is_initialized());
}
