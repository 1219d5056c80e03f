//! Agrilink Logging
//!
//! Installs a `tracing` subscriber for binaries and test harnesses that use the
//! Agrilink integration crates. The library crates themselves only emit
//! `tracing` events; nothing is printed until a subscriber is installed.
//!
//! # Environment Variables
//!
//! - `AGRILINK_DEBUG=1` - Enable debug logging
//! - `AGRILINK_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `AGRILINK_LOG_FORMAT=pretty|compact|json` - Set output format
//! - `AGRILINK_LOG_COLOR=1|0` - Enable/disable ANSI colors
//!
//! `RUST_LOG`, when set, takes precedence over `AGRILINK_LOG_LEVEL`.
//!
//! # Usage
//!
//! ```rust,no_run
//! agrilink_log::init();
//! tracing::info!(service = "timing", "integration layer ready");
//! ```

use once_cell::sync::Lazy;
use std::env;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level of events that reach the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Get level from string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_directive())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    /// Get format from string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether ANSI colors are enabled
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
        }
    }
}

impl LogConfig {
    /// Create config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let debug = flag("AGRILINK_DEBUG").unwrap_or(false);

        let level = lookup("AGRILINK_LOG_LEVEL")
            .and_then(|s| Level::from_name(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("AGRILINK_LOG_FORMAT")
            .and_then(|s| Format::from_name(&s))
            .unwrap_or(Format::Json);

        let color = flag("AGRILINK_LOG_COLOR")
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && lookup("TERM").is_some());

        Self {
            debug,
            level,
            format,
            color,
        }
    }

    /// Build the event filter, preferring `RUST_LOG` when present.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_directive()))
    }
}

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

/// Get the configuration read from the environment at first use.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

// ============================================================================
// Subscriber Installation
// ============================================================================

/// Install the global subscriber using the environment configuration.
///
/// Safe to call more than once; only the first call installs anything.
/// Returns `false` when a global subscriber was already set.
pub fn init() -> bool {
    init_with(config())
}

/// Install the global subscriber with an explicit configuration.
pub fn init_with(config: &LogConfig) -> bool {
    let registry = tracing_subscriber::registry().with(config.filter());
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.color)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        Format::Pretty => registry.with(layer.pretty()).try_init(),
        Format::Compact => registry.with(layer.compact()).try_init(),
        #[cfg(feature = "json")]
        Format::Json => registry.with(layer.json()).try_init(),
        #[cfg(not(feature = "json"))]
        Format::Json => registry.with(layer.compact()).try_init(),
    };

    installed.is_ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Off);
    }

    #[test]
    fn test_level_from_name() {
        assert_eq!(Level::from_name("debug"), Some(Level::Debug));
        assert_eq!(Level::from_name("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::from_name("warning"), Some(Level::Warn));
        assert_eq!(Level::from_name("invalid"), None);
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(Format::from_name("pretty"), Some(Format::Pretty));
        assert_eq!(Format::from_name("Compact"), Some(Format::Compact));
        assert_eq!(Format::from_name("json"), Some(Format::Json));
        assert_eq!(Format::from_name("xml"), None);
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = LogConfig::from_lookup(lookup(&[]));
        assert_eq!(config.level, Level::Info);
        assert_eq!(config.format, Format::Json);
        assert!(!config.debug);
        assert!(!config.color);
    }

    #[test]
    fn test_debug_flag_lowers_default_level() {
        let config = LogConfig::from_lookup(lookup(&[("AGRILINK_DEBUG", "true")]));
        assert!(config.debug);
        assert_eq!(config.level, Level::Debug);
    }

    #[test]
    fn test_explicit_level_wins_over_debug() {
        let config = LogConfig::from_lookup(lookup(&[
            ("AGRILINK_DEBUG", "1"),
            ("AGRILINK_LOG_LEVEL", "warn"),
            ("AGRILINK_LOG_FORMAT", "compact"),
            ("AGRILINK_LOG_COLOR", "0"),
        ]));
        assert_eq!(config.level, Level::Warn);
        assert_eq!(config.format, Format::Compact);
        assert!(!config.color);
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LogConfig {
            format: Format::Compact,
            ..LogConfig::default()
        };
        let _ = init_with(&config);
        assert!(!init_with(&config));
    }
}
