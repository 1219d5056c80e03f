// Environment variable loading

use crate::Result;
use serde_json::{Map, Value};
use std::env;

/// Environment variable loader.
///
/// With a prefix of `AGRILINK_TIMING`, the variable
/// `AGRILINK_TIMING_BASE_ADDRESS` is exposed under the key `base_address`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Create a loader for a prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(Some(prefix.into()))
    }

    /// Load all matching environment variables as typed JSON values
    pub fn load(&self) -> Result<Map<String, Value>> {
        Ok(self.collect(env::vars()))
    }

    /// Collect matching pairs from any variable source
    pub fn collect<I>(&self, vars: I) -> Map<String, Value>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Map::new();

        for (key, value) in vars {
            let key = match &self.prefix {
                Some(prefix) => match key.strip_prefix(prefix.as_str()) {
                    Some(rest) if rest.starts_with('_') => rest.trim_start_matches('_').to_string(),
                    _ => continue,
                },
                None => key,
            };
            config.insert(key.to_lowercase(), scalar(value));
        }

        config
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Numbers and booleans keep their type so they deserialize into numeric fields.
pub(crate) fn scalar(raw: String) -> Value {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(raw),
    }
}
