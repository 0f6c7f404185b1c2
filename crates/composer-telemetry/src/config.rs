//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to log lines
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error or a full directive)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "unit-composer".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `COMPOSER_SERVICE_NAME`: Service name (default: unit-composer)
    /// - `COMPOSER_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `COMPOSER_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `COMPOSER_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("COMPOSER_SERVICE_NAME")
                .unwrap_or_else(|_| "unit-composer".to_string()),

            log_level: env::var("COMPOSER_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("COMPOSER_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            json_logs: env::var("COMPOSER_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }

    /// Configuration for tests: debug level, no console noise.
    pub fn for_testing() -> Self {
        Self {
            log_level: "debug".to_string(),
            console_output: false,
            ..Self::default()
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
