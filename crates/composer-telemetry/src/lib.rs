//! # Composer Telemetry
//!
//! Observability for the unit composition pipeline.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` registry with an env filter and either
//!   a pretty or a JSON formatter
//! - **Metrics**: Prometheus counters and histograms for compositions,
//!   address locks and signatures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use composer_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `COMPOSER_SERVICE_NAME` | `unit-composer` | Service name in log lines |
//! | `COMPOSER_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `COMPOSER_JSON_LOGS` | `false` | Emit JSON log lines |
//! | `COMPOSER_CONSOLE_OUTPUT` | `true` | Write log lines to stdout |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingGuard};
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, ADDRESS_LOCKS_HELD,
    COMPOSITIONS, COMPOSITION_DURATION, DEFINITIONS_DISCLOSED, LOCK_WAIT_DURATION,
    SIGNATURES_COLLECTED, SIGNER_REFUSALS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Subscriber could not be installed (usually: one is already set).
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Metric registration failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Bad configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    let logging = init_logging(&config)?;

    Ok(TelemetryGuard {
        _logging: logging,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Convenience macro for a span carrying the composition id.
///
/// ```rust,ignore
/// let span = composition_span!("compose", id = %id, addresses = addresses.len());
/// ```
#[macro_export]
macro_rules! composition_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
