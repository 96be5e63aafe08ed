use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Shared telemetry handle threaded through dialogs and middleware.
pub type SharedTelemetrySink = Arc<dyn TelemetrySink>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Verbose,
    Information,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Verbose => "verbose",
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

/// Event/trace sink consumed by the dialog engine and middleware. All
/// operations are fire-and-forget; implementations buffer internally and
/// release on `flush`.
pub trait TelemetrySink: Send + Sync {
    fn track_event(
        &self,
        name: &str,
        properties: &BTreeMap<String, String>,
        measurements: &BTreeMap<String, f64>,
    );

    fn track_trace(&self, message: &str, severity: Severity, properties: &BTreeMap<String, String>);

    fn track_exception(&self, error: &str, properties: &BTreeMap<String, String>);

    fn track_dependency(&self, target: &str, name: &str, duration_ms: f64, success: bool);

    fn track_availability(&self, name: &str, duration_ms: f64, success: bool, message: &str);

    fn flush(&self) {}
}

/// Discards everything.
#[derive(Debug, Clone, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn track_event(
        &self,
        _name: &str,
        _properties: &BTreeMap<String, String>,
        _measurements: &BTreeMap<String, f64>,
    ) {
    }

    fn track_trace(
        &self,
        _message: &str,
        _severity: Severity,
        _properties: &BTreeMap<String, String>,
    ) {
    }

    fn track_exception(&self, _error: &str, _properties: &BTreeMap<String, String>) {}

    fn track_dependency(&self, _target: &str, _name: &str, _duration_ms: f64, _success: bool) {}

    fn track_availability(&self, _name: &str, _duration_ms: f64, _success: bool, _message: &str) {}
}

/// Forwards events to the tracing subscriber and bumps a counter per
/// event name.
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn track_event(
        &self,
        name: &str,
        properties: &BTreeMap<String, String>,
        measurements: &BTreeMap<String, f64>,
    ) {
        info!(
            event = %name,
            properties = %serde_json::to_string(properties).unwrap_or_default(),
            measurements = %serde_json::to_string(measurements).unwrap_or_default(),
            "telemetry event"
        );
        metrics::counter!("telemetry_events", "event" => name.to_string()).increment(1);
    }

    fn track_trace(&self, message: &str, severity: Severity, properties: &BTreeMap<String, String>) {
        match severity {
            Severity::Warning | Severity::Error | Severity::Critical => {
                warn!(severity = severity.as_str(), properties = ?properties, "{message}")
            }
            _ => debug!(severity = severity.as_str(), properties = ?properties, "{message}"),
        }
    }

    fn track_exception(&self, error: &str, properties: &BTreeMap<String, String>) {
        warn!(properties = ?properties, error = %error, "telemetry exception");
        metrics::counter!("telemetry_exceptions").increment(1);
    }

    fn track_dependency(&self, target: &str, name: &str, duration_ms: f64, success: bool) {
        debug!(target = %target, name = %name, duration_ms, success, "telemetry dependency");
        metrics::histogram!("telemetry_dependency_ms", "dependency" => name.to_string())
            .record(duration_ms);
    }

    fn track_availability(&self, name: &str, duration_ms: f64, success: bool, message: &str) {
        debug!(name = %name, duration_ms, success, "{message}");
    }
}

/// A single recorded event, kept by [`MemoryTelemetrySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub name: String,
    pub properties: BTreeMap<String, String>,
    pub measurements: BTreeMap<String, f64>,
}

/// Records events in order for test assertions.
#[derive(Default)]
pub struct MemoryTelemetrySink {
    events: Mutex<Vec<RecordedEvent>>,
    traces: Mutex<Vec<String>>,
}

impl MemoryTelemetrySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("telemetry lock poisoned").clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|event| event.name)
            .collect()
    }

    pub fn traces(&self) -> Vec<String> {
        self.traces.lock().expect("telemetry lock poisoned").clone()
    }
}

impl TelemetrySink for MemoryTelemetrySink {
    fn track_event(
        &self,
        name: &str,
        properties: &BTreeMap<String, String>,
        measurements: &BTreeMap<String, f64>,
    ) {
        self.events
            .lock()
            .expect("telemetry lock poisoned")
            .push(RecordedEvent {
                name: name.to_string(),
                properties: properties.clone(),
                measurements: measurements.clone(),
            });
    }

    fn track_trace(
        &self,
        message: &str,
        _severity: Severity,
        _properties: &BTreeMap<String, String>,
    ) {
        self.traces
            .lock()
            .expect("telemetry lock poisoned")
            .push(message.to_string());
    }

    fn track_exception(&self, error: &str, _properties: &BTreeMap<String, String>) {
        self.traces
            .lock()
            .expect("telemetry lock poisoned")
            .push(format!("exception: {error}"));
    }

    fn track_dependency(&self, _target: &str, _name: &str, _duration_ms: f64, _success: bool) {}

    fn track_availability(&self, _name: &str, _duration_ms: f64, _success: bool, _message: &str) {}
}
