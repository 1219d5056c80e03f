// Configuration validation

use crate::{ConfigError, Result};
use std::time::Duration;

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a count is at least one
    pub fn at_least_one(value: u32, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be at least 1",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a duration is non-zero
    pub fn positive_duration(value: Duration, field: &str) -> Result<()> {
        if value.is_zero() {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than zero",
                field
            )));
        }
        Ok(())
    }

    /// Validate URL format
    pub fn is_url(value: &str, field: &str) -> Result<()> {
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid http(s) URL",
                field
            )));
        }
        Ok(())
    }

    /// Validate an absolute request path
    pub fn is_path(value: &str, field: &str) -> Result<()> {
        if !value.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "{} must start with '/'",
                field
            )));
        }
        Ok(())
    }
}
