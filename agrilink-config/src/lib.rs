// Configuration management for Agrilink service clients

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;

/// Layered configuration: later loads override keys from earlier ones.
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    values: Map<String, Value>,
}

impl ConfigManager {
    /// Create an empty configuration manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables with a prefix
    pub fn load_env(&mut self, prefix: &str) -> Result<&mut Self> {
        let vars = EnvLoader::with_prefix(prefix).load()?;
        self.merge(vars);
        Ok(self)
    }

    /// Read prefixed variables from a `.env` file, then from the process environment.
    ///
    /// The file is parsed without touching the process environment; process
    /// variables override the file.
    pub fn load_dotenv(&mut self, path: impl AsRef<Path>, prefix: &str) -> Result<&mut Self> {
        let path = path.as_ref();
        let file_vars = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        self.merge(EnvLoader::with_prefix(prefix).collect(file_vars));
        self.load_env(prefix)
    }

    /// Load configuration from a file, detecting the format by extension
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let data = ConfigLoader::auto(path)?.load_file(path)?;

        match data {
            Value::Object(map) => {
                self.merge(map);
                Ok(self)
            }
            other => Err(ConfigError::ParseError(format!(
                "expected a table at the top level, found {}",
                other
            ))),
        }
    }

    /// Set a single value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e)))
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Deserialize every loaded key into `T` and validate it
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let validated: T = serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }

    fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            match (self.values.get_mut(&key), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    existing.extend(incoming);
                }
                (_, value) => {
                    self.values.insert(key, value);
                }
            }
        }
    }
}
