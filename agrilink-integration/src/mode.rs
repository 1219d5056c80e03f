//! Integration modes and adapter configuration.

use agrilink_config::{ConfigManager, Validate};
use agrilink_http_client::{ClientError, ServiceConfig};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How an adapter reaches its capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntegrationMode {
    /// Call the in-process implementation.
    DirectImport,
    /// Call the remote service.
    #[default]
    RestApi,
    /// Call the remote service, falling back to the in-process implementation.
    Hybrid,
}

impl IntegrationMode {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectImport => "direct_import",
            Self::RestApi => "rest_api",
            Self::Hybrid => "hybrid",
        }
    }

    /// Whether this mode calls the remote service.
    pub fn uses_remote(&self) -> bool {
        !matches!(self, Self::DirectImport)
    }

    /// Whether this mode may run the in-process implementation.
    pub fn uses_direct(&self) -> bool {
        !matches!(self, Self::RestApi)
    }
}

impl fmt::Display for IntegrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized integration mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown integration mode: {0:?} (expected direct_import, rest_api or hybrid)")]
pub struct ParseModeError(String);

impl FromStr for IntegrationMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "direct_import" | "direct" => Ok(Self::DirectImport),
            "rest_api" | "rest" => Ok(Self::RestApi),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

impl Serialize for IntegrationMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IntegrationMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Which remote failures send a hybrid adapter down the in-process path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HybridPolicy {
    /// Fall back only when a remote call failed after retries.
    #[default]
    FallbackOnServiceError,
    /// Also fall back while the circuit breaker is open.
    FallbackOnAnyError,
}

impl HybridPolicy {
    /// Whether `err` should trigger the fallback.
    pub fn allows(&self, err: &ClientError) -> bool {
        match self {
            Self::FallbackOnServiceError => err.is_fallback_eligible(),
            Self::FallbackOnAnyError => true,
        }
    }
}

/// Configuration for one adapter: a mode plus the remote service settings.
///
/// ```toml
/// mode = "hybrid"
/// fallback_on_unavailable = true
/// name = "timing"
/// base_address = "http://timing:8080"
/// max_retries = 2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct IntegrationConfig {
    /// Integration mode.
    #[serde(default)]
    pub mode: IntegrationMode,
    /// Let a hybrid adapter fall back while the breaker is open.
    #[serde(default)]
    pub fallback_on_unavailable: bool,
    /// Remote service settings.
    #[serde(flatten)]
    pub service: ServiceConfig,
}

impl IntegrationConfig {
    /// Create a configuration for a mode and remote service.
    pub fn new(mode: IntegrationMode, service: ServiceConfig) -> Self {
        Self {
            mode,
            fallback_on_unavailable: false,
            service,
        }
    }

    /// Load from prefixed environment variables, e.g. `AGRILINK_TIMING_MODE`.
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

    /// Fallback policy for hybrid mode.
    pub fn hybrid_policy(&self) -> HybridPolicy {
        if self.fallback_on_unavailable {
            HybridPolicy::FallbackOnAnyError
        } else {
            HybridPolicy::FallbackOnServiceError
        }
    }
}

impl Validate for IntegrationConfig {
    fn validate(&self) -> agrilink_config::Result<()> {
        self.service.validate()
    }
}
