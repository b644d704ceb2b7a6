//! Structured logging setup for the KERN runtime.
//!
//! Centralized `tracing` configuration. Call [`init_logging`] once at startup;
//! provider and converter code logs through the `tracing` macros.

use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level to emit.
    pub level: LogLevel,
    /// Include thread IDs (useful when debugging stream workers).
    pub with_thread_ids: bool,
    /// Include file/line of the call site.
    pub with_source_location: bool,
    /// Emit JSON instead of human-readable lines.
    pub json_format: bool,
}

/// Minimum log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Per-allocation and per-conversion detail.
    Debug,
    /// Registry lifecycle and provider setup.
    Info,
    /// Fallback paths and shutdown anomalies.
    Warn,
    /// Least verbose.
    Error,
}

impl LogLevel {
    fn as_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_thread_ids: false,
            with_source_location: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Verbose configuration for development: debug level, thread IDs, and
    /// source locations.
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            with_thread_ids: true,
            with_source_location: true,
            json_format: false,
        }
    }

    /// Production configuration: info level, JSON for log aggregation.
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            with_thread_ids: false,
            with_source_location: false,
            json_format: true,
        }
    }
}

/// Initialize the global logger. Call once at process start; `RUST_LOG`
/// overrides the configured level when set.
pub fn init_logging(config: LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.as_tracing_level().as_str()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_thread_ids(config.with_thread_ids)
            .with_file(config.with_source_location)
            .with_line_number(config.with_source_location);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    } else {
        let fmt_layer = fmt::layer()
            .with_thread_ids(config.with_thread_ids)
            .with_file(config.with_source_location)
            .with_line_number(config.with_source_location)
            .with_target(config.with_source_location);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert!(!config.json_format);
    }

    #[test]
    fn test_presets() {
        assert_eq!(LoggingConfig::development().level, LogLevel::Debug);
        assert!(LoggingConfig::development().with_thread_ids);
        assert!(LoggingConfig::production().json_format);
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::new().with_level(LogLevel::Trace);
        assert_eq!(config.level, LogLevel::Trace);
    }
}
