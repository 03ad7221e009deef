//! Structured logging for the `stratum` command.
//!
//! Log output goes to stderr so that it never mixes with dumped policies on
//! stdout. JSON output suits log collectors; the pretty format is for people.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The level or filter directive did not parse.
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// The rejected directive.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber was already installed.
    #[error("failed to initialize logging: {0}")]
    Init(String),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive, e.g. "warn" or "stratum_format=debug".
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Configuration from the command-line flags.
    ///
    /// `RUST_LOG`, when set, takes precedence over `level`.
    pub fn from_flags(level: &str, json_format: bool) -> Self {
        Self {
            level: std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| level.to_string()),
            json_format,
            ..Self::default()
        }
    }
}

/// Creates an env filter from a directive string.
pub fn create_env_filter(filter: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(filter).map_err(|e| LoggingError::InvalidFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns `LoggingError` if the filter is invalid or a subscriber is
/// already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = create_env_filter(&config.level)?;

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "warn");
        assert!(!config.json_format);
        assert!(config.include_target);
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("stratum_format=debug,warn").is_ok());
    }

    #[test]
    fn test_create_env_filter_invalid() {
        let err = create_env_filter("stratum=verbose").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFilter { .. }));
    }
}
