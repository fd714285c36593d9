//! Logging setup.
//!
//! The operator logs through `tracing`. Output format and filter come from
//! the environment:
//!
//! - `GHOST_LOG_FORMAT`: `json`, `pretty` or `compact`
//! - `GHOST_LOG_LEVEL` or `RUST_LOG`: filter directives

use anyhow::{Context, Result};
use std::env;
use std::io::IsTerminal;
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info,ghost_operator=info,kube=info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    log_format: LogFormat,
    log_filter: String,
    include_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            include_location: false,
        }
    }
}

impl TracingConfig {
    /// Read configuration from the environment.
    ///
    /// Without `GHOST_LOG_FORMAT`, a terminal gets `pretty` and anything else
    /// (a pod log, a pipe) gets `json`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok(), std::io::stderr().is_terminal())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>, is_terminal: bool) -> Self {
        let log_format = lookup("GHOST_LOG_FORMAT")
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or(if is_terminal {
                LogFormat::Pretty
            } else {
                LogFormat::Json
            });

        let log_filter = lookup("GHOST_LOG_LEVEL")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let include_location = lookup("GHOST_LOG_LOCATION")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false);

        Self {
            log_format,
            log_filter,
            include_location,
        }
    }

    /// Get the log format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Get the log filter.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Check if source location should be included.
    pub fn include_location(&self) -> bool {
        self.include_location
    }
}

/// Install the global subscriber.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_filter())
        .with_context(|| format!("Invalid log filter: {}", config.log_filter()))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format() {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.include_location())
                    .with_line_number(config.include_location())
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(config.include_location())
                    .with_line_number(config.include_location()),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_file(config.include_location())
                    .with_line_number(config.include_location()),
            )
            .try_init(),
    }
    .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("whatever".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    }

    #[test]
    fn format_follows_terminal_when_unset() {
        assert_eq!(
            TracingConfig::from_lookup(lookup(&[]), true).log_format(),
            LogFormat::Pretty
        );
        assert_eq!(
            TracingConfig::from_lookup(lookup(&[]), false).log_format(),
            LogFormat::Json
        );
    }

    #[test]
    fn ghost_log_level_wins_over_rust_log() {
        let config = TracingConfig::from_lookup(
            lookup(&[("GHOST_LOG_LEVEL", "debug"), ("RUST_LOG", "warn")]),
            false,
        );
        assert_eq!(config.log_filter(), "debug");

        let config = TracingConfig::from_lookup(lookup(&[("RUST_LOG", "warn")]), false);
        assert_eq!(config.log_filter(), "warn");

        let config = TracingConfig::from_lookup(lookup(&[]), false);
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn explicit_format_and_location() {
        let config = TracingConfig::from_lookup(
            lookup(&[("GHOST_LOG_FORMAT", "compact"), ("GHOST_LOG_LOCATION", "1")]),
            true,
        );
        assert_eq!(config.log_format(), LogFormat::Compact);
        assert!(config.include_location());
    }
}
