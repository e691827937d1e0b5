//! Tracing setup for folio binaries.
//!
//! Every binary calls [`init`] once at startup and holds the returned
//! [`TelemetryGuard`] until exit. Logs go to stderr, filtered by `RUST_LOG`
//! (default `info`).
//!
//! # OpenTelemetry
//!
//! Built with the `telemetry` feature, spans are also exported over OTLP when
//! the standard OTel environment variables ask for it:
//!
//! ```bash
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 folio show home
//! ```
//!
//! `OTEL_SDK_DISABLED=true` turns export off even when an endpoint is set.

#[cfg(feature = "telemetry")]
mod otel;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),

    #[error("OTLP export requires a running tokio runtime")]
    NoRuntime,

    #[error("failed to build OTLP exporter: {0}")]
    Exporter(String),
}

/// Keeps exporters alive. Dropping it flushes pending spans.
#[derive(Default)]
pub struct TelemetryGuard {
    #[cfg(feature = "telemetry")]
    _otel: Option<otel::OtelGuard>,
}

impl TelemetryGuard {
    /// Whether spans are being exported.
    pub fn exporting(&self) -> bool {
        #[cfg(feature = "telemetry")]
        {
            self._otel.is_some()
        }
        #[cfg(not(feature = "telemetry"))]
        {
            false
        }
    }
}

/// Install the global subscriber.
pub fn init(service_name: &str) -> Result<TelemetryGuard, TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    #[cfg(feature = "telemetry")]
    if otel_enabled() {
        let (layer, guard) = otel::otel_layer(service_name)?;
        registry.with(layer).try_init()?;
        tracing::debug!(service = service_name, "tracing initialized with OTLP export");
        return Ok(TelemetryGuard { _otel: Some(guard) });
    }

    registry.try_init()?;
    tracing::debug!(service = service_name, "tracing initialized");
    Ok(TelemetryGuard::default())
}

/// Check whether OTel export should be enabled.
///
/// True when `OTEL_SDK_DISABLED` is not `"true"` and either
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set or `OTEL_TRACES_EXPORTER` names
/// something other than `"none"`.
pub fn otel_enabled() -> bool {
    otel_enabled_with(|key| std::env::var(key).ok())
}

fn otel_enabled_with(var: impl Fn(&str) -> Option<String>) -> bool {
    if var("OTEL_SDK_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return false;
    }
    if var("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
        return true;
    }
    var("OTEL_TRACES_EXPORTER").is_some_and(|v| !v.eq_ignore_ascii_case("none"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_otel_off_by_default() {
        assert!(!otel_enabled_with(env(&[])));
    }

    #[test]
    fn test_endpoint_enables_export() {
        assert!(otel_enabled_with(env(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317")])));
    }

    #[test]
    fn test_sdk_disabled_wins() {
        assert!(!otel_enabled_with(env(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
            ("OTEL_SDK_DISABLED", "TRUE"),
        ])));
    }

    #[test]
    fn test_traces_exporter_none() {
        assert!(!otel_enabled_with(env(&[("OTEL_TRACES_EXPORTER", "none")])));
        assert!(otel_enabled_with(env(&[("OTEL_TRACES_EXPORTER", "otlp")])));
    }

    #[test]
    fn test_guard_without_export() {
        assert!(!TelemetryGuard::default().exporting());
    }
}
