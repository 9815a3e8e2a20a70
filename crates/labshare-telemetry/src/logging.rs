//! Structured logging helpers.
//!
//! Log lines carry a `component` field so lines from the ingestor, the
//! applier and resync can be filtered apart.

use crate::TelemetryConfig;

/// Emit the startup line describing the active log configuration.
pub(crate) fn announce(config: &TelemetryConfig) {
    tracing::debug!(
        service = %config.full_service_name(),
        json_logs = config.json_logs,
        otlp = config.otlp_endpoint.is_some(),
        "Structured logging configured"
    );
}

/// Log an event-pipeline line with the standard fields.
///
/// ```rust,ignore
/// log_event!(warn, "ls-06", "apply failed", event_id = %id, error = %e);
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:ident, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}
