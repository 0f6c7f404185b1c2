//! Prometheus metrics for the composition pipeline.
//!
//! All metrics follow the naming convention: `composer_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: compositions, signatures, refusals, disclosed definitions
//! - **Gauge**: address locks currently held
//! - **Histogram**: composition latency, time spent waiting for locks

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // COMPOSITION
    // =========================================================================

    /// Compositions by node mode and outcome
    pub static ref COMPOSITIONS: CounterVec = CounterVec::new(
        Opts::new("composer_compositions_total", "Total unit compositions"),
        &["mode", "outcome"]  // mode: full/light, outcome: ok/error/not_enough_funds
    ).expect("metric creation failed");

    /// End-to-end composition latency
    pub static ref COMPOSITION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "composer_composition_duration_seconds",
            "Time from request to finalized joint"
        ).buckets(exponential_buckets(0.0005, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Definitions disclosed in composed units
    pub static ref DEFINITIONS_DISCLOSED: Counter = Counter::new(
        "composer_definitions_disclosed_total",
        "Author definitions included because they were not yet stable on the ledger"
    ).expect("metric creation failed");

    // =========================================================================
    // ADDRESS LOCKS
    // =========================================================================

    /// Time spent waiting for an address group lock
    pub static ref LOCK_WAIT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "composer_lock_wait_duration_seconds",
            "Time spent waiting for address locks"
        ).buckets(exponential_buckets(0.0001, 2.0, 18).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Address keys currently locked
    pub static ref ADDRESS_LOCKS_HELD: Gauge = Gauge::new(
        "composer_address_locks_held",
        "Number of address keys currently locked"
    ).expect("metric creation failed");

    // =========================================================================
    // SIGNING
    // =========================================================================

    /// Signatures collected from signers
    pub static ref SIGNATURES_COLLECTED: Counter = Counter::new(
        "composer_signatures_collected_total",
        "Total authentifiers produced by signers"
    ).expect("metric creation failed");

    /// Signing requests refused by a signer
    pub static ref SIGNER_REFUSALS: Counter = Counter::new(
        "composer_signer_refusals_total",
        "Total signing requests refused"
    ).expect("metric creation failed");
}

/// Handle to the metrics registry.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless: already registered collectors
/// are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Composition
        Box::new(COMPOSITIONS.clone()),
        Box::new(COMPOSITION_DURATION.clone()),
        Box::new(DEFINITIONS_DISCLOSED.clone()),
        // Locks
        Box::new(LOCK_WAIT_DURATION.clone()),
        Box::new(ADDRESS_LOCKS_HELD.clone()),
        // Signing
        Box::new(SIGNATURES_COLLECTED.clone()),
        Box::new(SIGNER_REFUSALS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }

    /// Seconds elapsed so far.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.elapsed_secs());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
