//! Lightweight telemetry helpers for Botframe services.
//! Provides the sink trait consumed by the dialog engine, counter
//! helpers, and the tracing-subscriber bootstrap.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod metrics;
mod sink;

pub use metrics::{TelemetryLabels, record_counter, record_histogram};
pub use sink::{
    MemoryTelemetrySink, NullTelemetrySink, RecordedEvent, Severity, SharedTelemetrySink,
    TelemetrySink, TracingTelemetrySink,
};

/// Installs the fmt tracing subscriber configured from `RUST_LOG`.
pub fn install(service_name: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;
    tracing::info!(service = %service_name, "telemetry installed");
    Ok(())
}
