//! # LabShare Telemetry
//!
//! Observability for the mirror pipeline.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an env filter and a pretty or JSON
//!   formatter
//! - **Traces**: optional OpenTelemetry OTLP export
//! - **Metrics**: Prometheus counters/gauges/histograms for ingestion,
//!   application and resync
//!
//! ## Usage
//!
//! ```rust,ignore
//! use labshare_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).await.expect("telemetry");
//!     // ingestion runs here
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP endpoint; export disabled when unset |
//! | `OTEL_SERVICE_NAME` | `labshare-mirror` | Service name in traces |
//! | `LSD_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `LSD_JSON_LOGS` | `false` | JSON log lines |
//! | `LSD_NETWORK` | `testnet` | Deployment environment tag |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, APPLY_DURATION, APPLY_FAILURES,
    BACKPRESSURE_TRIPS, BUFFER_DEPTH, DEAD_LETTERED, DUPLICATES_DROPPED, EVENTS_APPLIED,
    EVENTS_RECEIVED, INGESTOR_STATE, RECONNECTS, RESYNC_EVENTS,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging, optional trace export and the metrics registry.
///
/// Returns a guard that must be held for the lifetime of the application.
/// When dropped, pending spans are flushed.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    let tracing_guard = tracing_setup::init_tracing(&config).await?;
    logging::announce(&config);

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Convenience macro for creating a span with component context.
///
/// ```rust,ignore
/// let _span = component_span!("apply_event", component = "ls-06", event_id = %id);
/// ```
#[macro_export]
macro_rules! component_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "labshare-mirror");
        assert!(config.otlp_endpoint.is_none());
    }
}
