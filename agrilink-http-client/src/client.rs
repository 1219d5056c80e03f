//! Resilient service client implementation.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use url::Url;

use crate::request::parse_header;
use crate::{
    CircuitBreaker, ClientError, FailureCause, ReqwestTransport, RequestOptions, Result,
    RetryDecision, RetryPolicy, ServiceConfig, ServiceError, ServiceUnavailableError, Transport,
    TransportRequest,
};

/// Client for one remote dependency with retry, circuit breaker, and timeout support.
///
/// The breaker and the transport belong to this instance. Share a client (or
/// its breaker) by wrapping it in an `Arc` and handing it to each call site.
pub struct ResilientClient {
    config: Arc<ServiceConfig>,
    retry: RetryPolicy,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    transport: Arc<dyn Transport>,
    closed: AtomicBool,
}

impl ResilientClient {
    /// Create a client using the reqwest transport.
    ///
    /// No connections are opened until the first request.
    pub fn new(config: ServiceConfig) -> Self {
        let transport = Arc::new(ReqwestTransport::new(&config));
        Self::with_transport(config, transport)
    }

    /// Create a client over an explicit transport.
    pub fn with_transport(config: ServiceConfig, transport: Arc<dyn Transport>) -> Self {
        let circuit_breaker = config
            .circuit_breaker()
            .map(|cb_config| Arc::new(CircuitBreaker::new(config.name.clone(), cb_config)));

        Self {
            retry: config.retry_policy(),
            config: Arc::new(config),
            circuit_breaker,
            transport,
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the owned breaker with one shared by other clients.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Name of the dependency this client talks to.
    pub fn service_name(&self) -> &str {
        &self.config.name
    }

    /// Get the circuit breaker, if enabled.
    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.circuit_breaker.as_ref()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Issue a GET and decode the response body into `T`.
    pub async fn get<T>(&self, path: &str, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let (body, attempts) = self.execute(Method::GET, path, &options, None).await?;
        self.decode(&body, attempts)
    }

    /// Issue a POST with a JSON body and decode the response body into `T`.
    pub async fn post<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| self.failed(0, FailureCause::InvalidRequest(e.to_string())))?;
        let (body, attempts) = self
            .execute(Method::POST, path, &options, Some(Bytes::from(payload)))
            .await?;
        self.decode(&body, attempts)
    }

    /// Probe the dependency's health endpoint.
    ///
    /// Never fails: an open circuit, a closed client, a transport error or a
    /// non-2xx status all report `false`. The probe is a single attempt and
    /// does not feed the circuit breaker.
    pub async fn health_check(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        if let Some(cb) = &self.circuit_breaker
            && cb.is_open()
        {
            debug!(service = %self.config.name, "Health check skipped, circuit open");
            return false;
        }

        let request = match self.build_request(
            Method::GET,
            &self.config.health_check_path,
            &RequestOptions::new(),
            None,
        ) {
            Ok(request) => request,
            Err(cause) => {
                warn!(service = %self.config.name, error = %cause, "Health check request invalid");
                return false;
            }
        };

        match self.send(request).await {
            Ok(response) => response.status.is_success(),
            Err(cause) => {
                debug!(service = %self.config.name, error = %cause, "Health check failed");
                false
            }
        }
    }

    /// Release the underlying connection pool.
    ///
    /// Idempotent: returns `true` on the call that closed the client and
    /// `false` afterwards, without touching the transport again.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        debug!(service = %self.config.name, "Closing service client");
        self.transport.close();
        true
    }

    /// Execute a request under the breaker and retry policy.
    ///
    /// Returns the 2xx body and the number of attempts it took.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        options: &RequestOptions,
        body: Option<Bytes>,
    ) -> Result<(Bytes, u32)> {
        if self.is_closed() {
            return Err(self.failed(0, FailureCause::Closed));
        }

        if let Some(cb) = &self.circuit_breaker
            && !cb.can_request()
        {
            warn!(service = %self.config.name, "Circuit open, rejecting request");
            return Err(ServiceUnavailableError::new(self.config.name.as_str()).into());
        }

        let request = self
            .build_request(method, path, options, body)
            .map_err(|cause| self.failed(0, cause))?;

        let mut attempt = 1;
        loop {
            let cause = match self.send(request.clone()).await {
                Ok(response) if response.status.is_success() => {
                    if let Some(cb) = &self.circuit_breaker {
                        cb.record_success();
                    }
                    return Ok((response.body, attempt));
                }
                Ok(response) => FailureCause::Status {
                    status: response.status.as_u16(),
                    body: response.text(),
                },
                Err(cause) => cause,
            };

            match self.retry.decide(attempt, &cause) {
                RetryDecision::Retry(delay) => {
                    debug!(
                        service = %self.config.name,
                        attempt,
                        error = %cause,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Exhausted => {
                    if let Some(cb) = &self.circuit_breaker {
                        cb.record_failure();
                    }
                    warn!(
                        service = %self.config.name,
                        attempts = attempt,
                        error = %cause,
                        "Request failed after retries"
                    );
                    return Err(self.failed(attempt, cause));
                }
                RetryDecision::Terminal => {
                    debug!(
                        service = %self.config.name,
                        attempt,
                        error = %cause,
                        "Request rejected, not retrying"
                    );
                    return Err(self.failed(attempt, cause));
                }
            }
        }
    }

    /// Send one attempt, bounded by its own timeout.
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<crate::TransportResponse, FailureCause> {
        let timeout = request.timeout;
        match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(FailureCause::Timeout(timeout)),
        }
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        options: &RequestOptions,
        body: Option<Bytes>,
    ) -> std::result::Result<TransportRequest, FailureCause> {
        let url = self.build_url(path, options)?;

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if body.is_some() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        for (name, value) in &self.config.default_headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }
        options.apply_headers(&mut headers)?;

        Ok(TransportRequest {
            method,
            url,
            headers,
            body,
            timeout: options
                .timeout_override()
                .unwrap_or(self.config.request_timeout),
        })
    }

    fn build_url(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> std::result::Result<Url, FailureCause> {
        // Keep any path prefix on the base address.
        let base = format!("{}/", self.config.base_address.trim_end_matches('/'));
        let base = Url::parse(&base).map_err(|e| FailureCause::InvalidUrl(e.to_string()))?;
        let mut url = base
            .join(path.trim_start_matches('/'))
            .map_err(|e| FailureCause::InvalidUrl(e.to_string()))?;

        if !options.query_pairs().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in options.query_pairs() {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    fn decode<T: DeserializeOwned>(&self, body: &[u8], attempts: u32) -> Result<T> {
        let body = if body.iter().all(u8::is_ascii_whitespace) {
            b"null".as_slice()
        } else {
            body
        };
        serde_json::from_slice(body)
            .map_err(|e| self.failed(attempts, FailureCause::Decode(e.to_string())))
    }

    fn failed(&self, attempts: u32, cause: FailureCause) -> ClientError {
        ServiceError::new(self.config.name.as_str(), attempts, cause).into()
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("service", &self.config.name)
            .field("base_address", &self.config.base_address)
            .field("circuit_breaker", &self.circuit_breaker.as_ref().map(|cb| cb.state()))
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(base: &str) -> ResilientClient {
        ResilientClient::new(ServiceConfig::new("timing", base))
    }

    #[test]
    fn test_client_creation() {
        let client = client("http://timing:8080");
        assert_eq!(client.service_name(), "timing");
        assert!(client.circuit_breaker().is_some());
        assert!(!client.is_closed());
    }

    #[test]
    fn test_breaker_disabled() {
        let config = ServiceConfig::builder("timing", "http://timing")
            .circuit_breaker_enabled(false)
            .build();
        assert!(ResilientClient::new(config).circuit_breaker().is_none());
    }

    #[test]
    fn test_url_keeps_base_path_prefix() {
        let client = client("http://gateway/timing/");
        let url = client
            .build_url("/api/v1/optimize", &RequestOptions::new().query("crop", "maize"))
            .unwrap();
        assert_eq!(url.as_str(), "http://gateway/timing/api/v1/optimize?crop=maize");
    }

    #[test]
    fn test_invalid_base_address() {
        let client = client("not a url");
        assert!(matches!(
            client.build_url("/x", &RequestOptions::new()),
            Err(FailureCause::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_request_headers_and_timeout() {
        let config = ServiceConfig::builder("timing", "http://timing")
            .default_header("x-tenant", "coop-7")
            .request_timeout(Duration::from_secs(4))
            .build();
        let client = ResilientClient::new(config);

        let request = client
            .build_request(
                Method::POST,
                "/optimize",
                &RequestOptions::new().header("x-request-id", "r1"),
                Some(Bytes::from_static(b"{}")),
            )
            .unwrap();

        assert_eq!(request.headers["x-tenant"], "coop-7");
        assert_eq!(request.headers["x-request-id"], "r1");
        assert_eq!(request.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(request.timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        let client = client("http://timing");
        let value: serde_json::Value = client.decode(b"", 1).unwrap();
        assert!(value.is_null());
        let unit: Option<u32> = client.decode(b"  ", 1).unwrap();
        assert_eq!(unit, None);
    }
}
