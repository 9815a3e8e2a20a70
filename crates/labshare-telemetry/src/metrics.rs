//! Prometheus metrics for the mirror pipeline.
//!
//! All metrics follow the naming convention: `lsd_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., events_applied_total)
//! - **Gauge**: Value that can go up or down (e.g., buffer_depth)
//! - **Histogram**: Distribution of values (e.g., apply_duration_seconds)

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
    // INGESTOR METRICS (ls-05)
    // =========================================================================

    /// Raw events received from the subscription
    pub static ref EVENTS_RECEIVED: Counter = Counter::new(
        "lsd_ingestor_events_received_total",
        "Total raw events received from the chain subscription"
    ).expect("metric creation failed");

    /// Events dropped because their id was already processed
    pub static ref DUPLICATES_DROPPED: Counter = Counter::new(
        "lsd_ingestor_duplicates_dropped_total",
        "Events dropped by the event-id cache before normalization"
    ).expect("metric creation failed");

    /// Ingestor state (0=stopped, 1=subscribing, 2=live, 3=reconnecting)
    pub static ref INGESTOR_STATE: Gauge = Gauge::new(
        "lsd_ingestor_state",
        "Current ingestor state"
    ).expect("metric creation failed");

    /// Reconnection attempts
    pub static ref RECONNECTS: Counter = Counter::new(
        "lsd_ingestor_reconnects_total",
        "Total reconnection attempts"
    ).expect("metric creation failed");

    /// Subscriptions dropped because the buffer overflowed
    pub static ref BACKPRESSURE_TRIPS: Counter = Counter::new(
        "lsd_ingestor_backpressure_trips_total",
        "Times the live buffer overflowed and the subscription was dropped"
    ).expect("metric creation failed");

    /// Events waiting for the applier
    pub static ref BUFFER_DEPTH: Gauge = Gauge::new(
        "lsd_ingestor_buffer_depth",
        "Events buffered between subscription and applier"
    ).expect("metric creation failed");

    // =========================================================================
    // APPLIER METRICS (ls-06)
    // =========================================================================

    /// Events committed to the mirror, by kind
    pub static ref EVENTS_APPLIED: CounterVec = CounterVec::new(
        Opts::new("lsd_applier_events_applied_total", "Events applied to the mirror"),
        &["kind"]
    ).expect("metric creation failed");

    /// Apply failures, by error kind
    pub static ref APPLY_FAILURES: CounterVec = CounterVec::new(
        Opts::new("lsd_applier_failures_total", "Per-event apply failures"),
        &["error_kind"]
    ).expect("metric creation failed");

    /// Events moved to the dead-letter table
    pub static ref DEAD_LETTERED: Counter = Counter::new(
        "lsd_applier_dead_lettered_total",
        "Events moved to the dead-letter table"
    ).expect("metric creation failed");

    /// Time spent applying one event
    pub static ref APPLY_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "lsd_applier_apply_duration_seconds",
            "Time spent applying one event"
        ).buckets(exponential_buckets(0.0001, 2.0, 14).unwrap())
    ).expect("metric creation failed");

    // =========================================================================
    // RESYNC METRICS (ls-07)
    // =========================================================================

    /// Events replayed by resync, by mode
    pub static ref RESYNC_EVENTS: CounterVec = CounterVec::new(
        Opts::new("lsd_resync_events_replayed_total", "Events replayed through resync"),
        &["mode"]
    ).expect("metric creation failed");
}

/// Handle for the metrics registry
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Ingestor
        Box::new(EVENTS_RECEIVED.clone()),
        Box::new(DUPLICATES_DROPPED.clone()),
        Box::new(INGESTOR_STATE.clone()),
        Box::new(RECONNECTS.clone()),
        Box::new(BACKPRESSURE_TRIPS.clone()),
        Box::new(BUFFER_DEPTH.clone()),
        // Applier
        Box::new(EVENTS_APPLIED.clone()),
        Box::new(APPLY_FAILURES.clone()),
        Box::new(DEAD_LETTERED.clone()),
        Box::new(APPLY_DURATION.clone()),
        // Resync
        Box::new(RESYNC_EVENTS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
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
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
