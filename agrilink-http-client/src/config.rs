//! Per-dependency service configuration.

use agrilink_config::{ConfigManager, ConfigValidator, Validate};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryPolicy;

/// Configuration for one remote dependency.
///
/// Deserializes from the option names used in config files and environment
/// variables (`base_address`, `request_timeout_seconds`, `max_retries`,
/// `retry_delay_seconds`, `failure_threshold`, `open_timeout_seconds`,
/// `half_open_max_calls`, `health_check_path`, `circuit_breaker_enabled`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Dependency name, used in errors and logs.
    #[serde(deserialize_with = "text")]
    pub name: String,
    /// Base URL every request path is joined onto.
    #[serde(deserialize_with = "text")]
    pub base_address: String,
    /// Timeout for a single attempt.
    #[serde(rename = "request_timeout_seconds", deserialize_with = "seconds")]
    pub request_timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff base delay.
    #[serde(rename = "retry_delay_seconds", deserialize_with = "seconds")]
    pub retry_delay: Duration,
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Cool-down before an open circuit admits probes.
    #[serde(rename = "open_timeout_seconds", deserialize_with = "seconds")]
    pub open_timeout: Duration,
    /// Probe budget while half-open.
    pub half_open_max_calls: u32,
    /// Path probed by `health_check`.
    #[serde(deserialize_with = "text")]
    pub health_check_path: String,
    /// Attach a circuit breaker to the client.
    pub circuit_breaker_enabled: bool,
    /// Headers sent with every request.
    pub default_headers: Vec<(String, String)>,
    /// User agent string.
    #[serde(deserialize_with = "text")]
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "service".to_string(),
            base_address: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
            health_check_path: "/health".to_string(),
            circuit_breaker_enabled: true,
            default_headers: Vec::new(),
            user_agent: format!("agrilink-http-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ServiceConfig {
    /// Create a configuration for a named dependency at a base address.
    pub fn new(name: impl Into<String>, base_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_address: base_address.into(),
            ..Default::default()
        }
    }

    /// Create a new configuration builder.
    pub fn builder(name: impl Into<String>, base_address: impl Into<String>) -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::new(name, base_address),
        }
    }

    /// Load from prefixed environment variables, e.g. `AGRILINK_TIMING_BASE_ADDRESS`.
    pub fn from_env(prefix: &str) -> agrilink_config::Result<Self> {
        let mut manager = ConfigManager::new();
        manager.load_env(prefix)?;
        manager.load_validated()
    }

    /// Load from a `.env` file and then the process environment, which wins.
    pub fn from_dotenv(path: impl AsRef<Path>, prefix: &str) -> agrilink_config::Result<Self> {
        let mut manager = ConfigManager::new();
        manager.load_dotenv(path, prefix)?;
        manager.load_validated()
    }

    /// Load from a JSON or TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> agrilink_config::Result<Self> {
        let mut manager = ConfigManager::new();
        manager.load_file(path)?;
        manager.load_validated()
    }

    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_retries, self.retry_delay)
    }

    /// Circuit breaker configuration, if the breaker is enabled.
    pub fn circuit_breaker(&self) -> Option<CircuitBreakerConfig> {
        self.circuit_breaker_enabled.then(|| {
            CircuitBreakerConfig::new(self.failure_threshold, self.open_timeout)
                .with_half_open_max_calls(self.half_open_max_calls)
        })
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> agrilink_config::Result<()> {
        ConfigValidator::not_empty(&self.name, "name")?;
        ConfigValidator::is_url(&self.base_address, "base_address")?;
        ConfigValidator::positive_duration(self.request_timeout, "request_timeout_seconds")?;
        ConfigValidator::at_least_one(self.failure_threshold, "failure_threshold")?;
        ConfigValidator::at_least_one(self.half_open_max_calls, "half_open_max_calls")?;
        ConfigValidator::is_path(&self.health_check_path, "health_check_path")?;
        Ok(())
    }
}

/// Builder for service configuration.
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Set the per-attempt request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the number of retries after the first attempt.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the backoff base delay.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Set the consecutive-failure threshold.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set the open-state cool-down.
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    /// Set the half-open probe budget.
    pub fn half_open_max_calls(mut self, calls: u32) -> Self {
        self.config.half_open_max_calls = calls;
        self
    }

    /// Set the health check path.
    pub fn health_check_path(mut self, path: impl Into<String>) -> Self {
        self.config.health_check_path = path.into();
        self
    }

    /// Enable or disable the circuit breaker.
    pub fn circuit_breaker_enabled(mut self, enabled: bool) -> Self {
        self.config.circuit_breaker_enabled = enabled;
        self
    }

    /// Add a default header for all requests.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

fn seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

// Environment values that look numeric arrive as numbers.
fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {other}"
        ))),
    }
}
