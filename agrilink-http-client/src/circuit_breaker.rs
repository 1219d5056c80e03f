//! Circuit breaker pattern implementation.
//!
//! One breaker guards one dependency for one client. It is never registered
//! globally; call sites that must share fate hold the same `Arc<CircuitBreaker>`.
//!
//! ```text
//! Closed   --failure_threshold consecutive failures--> Open
//! Open     --open_timeout elapsed, on next can_request--> HalfOpen
//! HalfOpen --half_open_max_calls successes--> Closed
//! HalfOpen --any failure--> Open
//! ```
//!
//! Time is read from `tokio::time::Instant`, so paused-clock tests can drive
//! the open timeout with `tokio::time::advance`.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed.
    Closed,
    /// Circuit is open, requests are rejected.
    Open,
    /// Circuit is half-open, limited requests are allowed for testing.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures to open the circuit.
    pub failure_threshold: u32,
    /// Time to wait after the last failure before probing again.
    pub open_timeout: Duration,
    /// Probe budget in half-open state; this many successes close the circuit.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new circuit breaker config.
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            open_timeout,
            ..Default::default()
        }
    }

    /// Set the number of half-open probe calls.
    pub fn with_half_open_max_calls(mut self, count: u32) -> Self {
        self.half_open_max_calls = count;
        self
    }
}

/// Snapshot of breaker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitStats {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures counted while closed.
    pub failure_count: u32,
    /// Successes recorded during the current half-open probe.
    pub half_open_calls: u32,
    /// Successes recorded over the breaker's lifetime.
    pub total_successes: u64,
    /// Failures recorded over the breaker's lifetime.
    pub total_failures: u64,
    /// Requests rejected by `can_request`.
    pub total_rejections: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    half_open_calls: u32,
    // Probes admitted in the current half-open window.
    half_open_admitted: u32,
    half_open_since: Option<Instant>,
}

/// Circuit breaker implementation.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker for the named dependency.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                half_open_calls: 0,
                half_open_admitted: 0,
                half_open_since: None,
            }),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    /// Name of the guarded dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the breaker configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current circuit state without triggering a transition.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// True while the circuit is open and the open timeout has not elapsed.
    pub fn is_open(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == CircuitState::Open && !self.timeout_elapsed(&inner)
    }

    /// Check if a request is allowed.
    ///
    /// An open circuit whose timeout has elapsed moves to half-open here.
    pub fn can_request(&self) -> bool {
        let mut inner = self.inner.lock();

        let allowed = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.timeout_elapsed(&inner) {
                    debug!(service = %self.name, "Circuit breaker transitioning to half-open");
                    self.enter_half_open(&mut inner);
                    inner.half_open_admitted = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                // A probe that never reported back must not wedge the circuit.
                if inner.half_open_admitted >= self.config.half_open_max_calls
                    && inner
                        .half_open_since
                        .is_some_and(|since| since.elapsed() >= self.config.open_timeout)
                {
                    debug!(service = %self.name, "Half-open probe window expired, admitting new probes");
                    inner.half_open_admitted = 0;
                    inner.half_open_since = Some(Instant::now());
                }

                if inner.half_open_calls < self.config.half_open_max_calls
                    && inner.half_open_admitted < self.config.half_open_max_calls
                {
                    inner.half_open_admitted += 1;
                    true
                } else {
                    false
                }
            }
        };

        if !allowed {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
        }
        allowed
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_calls += 1;
                if inner.half_open_calls >= self.config.half_open_max_calls {
                    self.close(&mut inner);
                }
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late.
                debug!(service = %self.name, "Success recorded while circuit open, ignoring");
            }
        }
    }

    /// Record a failed request.
    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();

        inner.last_failure_time = Some(Instant::now());
        inner.failure_count = inner.failure_count.saturating_add(1);

        match inner.state {
            CircuitState::HalfOpen => {
                warn!(service = %self.name, "Probe failed in half-open state, reopening circuit");
                self.open(&mut inner);
            }
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                warn!(
                    service = %self.name,
                    failures = inner.failure_count,
                    open_timeout = ?self.config.open_timeout,
                    "Circuit breaker opening"
                );
                self.open(&mut inner);
            }
            _ => {}
        }
    }

    /// Force the circuit closed and clear its counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.close(&mut inner);
        inner.last_failure_time = None;
    }

    /// Get failure count.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Get successes recorded in the current half-open probe.
    pub fn half_open_calls(&self) -> u32 {
        self.inner.lock().half_open_calls
    }

    /// Get a snapshot of the breaker counters.
    pub fn stats(&self) -> CircuitStats {
        let inner = self.inner.lock();
        CircuitStats {
            state: inner.state,
            failure_count: inner.failure_count,
            half_open_calls: inner.half_open_calls,
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }

    fn timeout_elapsed(&self, inner: &BreakerState) -> bool {
        inner
            .last_failure_time
            .is_none_or(|at| at.elapsed() >= self.config.open_timeout)
    }

    fn open(&self, inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.half_open_calls = 0;
        inner.half_open_admitted = 0;
        inner.half_open_since = None;
    }

    fn enter_half_open(&self, inner: &mut BreakerState) {
        inner.state = CircuitState::HalfOpen;
        inner.half_open_calls = 0;
        inner.half_open_admitted = 0;
        inner.half_open_since = Some(Instant::now());
    }

    fn close(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Closed {
            info!(service = %self.name, "Circuit breaker closing");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.half_open_calls = 0;
        inner.half_open_admitted = 0;
        inner.half_open_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout_secs: u64, half_open: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "timing",
            CircuitBreakerConfig::new(threshold, Duration::from_secs(timeout_secs))
                .with_half_open_max_calls(half_open),
        )
    }

    #[test]
    fn test_circuit_breaker_opens_after_failures() {
        let cb = breaker(3, 60, 1);

        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_request());

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_request());
        assert!(cb.is_open());
    }

    #[test]
    fn test_circuit_breaker_success_resets_failures() {
        let cb = breaker(3, 60, 1);

        cb.record_failure();
        cb.record_failure();
        cb.record_success();

        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_rejects_until_timeout() {
        let cb = breaker(1, 60, 1);
        cb.record_failure();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!cb.can_request());
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cb.can_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.half_open_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_bounded_probes() {
        let cb = breaker(1, 10, 2);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(cb.can_request());
        assert!(cb.can_request());
        assert!(!cb.can_request());
        assert_eq!(cb.stats().total_rejections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_success_closes() {
        let cb = breaker(2, 5, 1);
        cb.record_failure();
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.can_request());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.half_open_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_probe_successes_required() {
        let cb = breaker(1, 5, 3);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;

        for expected in 1..3 {
            assert!(cb.can_request());
            cb.record_success();
            assert_eq!(cb.state(), CircuitState::HalfOpen);
            assert_eq!(cb.half_open_calls(), expected);
        }

        assert!(cb.can_request());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(1, 5, 3);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.can_request());
        cb.record_success();
        assert_eq!(cb.half_open_calls(), 1);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.half_open_calls(), 0);
        assert!(!cb.can_request());

        // The cool-down restarts from the probe failure.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.can_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_probe_window_expires() {
        let cb = breaker(1, 5, 1);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.can_request());
        assert!(!cb.can_request());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.can_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_reset_closes_circuit() {
        let cb = breaker(1, 60, 1);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_request());

        let stats = cb.stats();
        assert_eq!(stats.total_failures, 1);
        assert_eq!(stats.failure_count, 0);
    }
}
