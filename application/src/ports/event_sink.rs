//! Port for structured run events.
//!
//! Defines the [`EventSink`] trait for recording orchestration events
//! (step failures, dependency deadlocks, plan rejections, iteration results)
//! to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures the run's
//! audit trail in a machine-readable format (JSONL in the shipped adapter).

use serde_json::Value;

/// A structured run event.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEvent {
    pub run_id: String,
    /// Component that raised the event (e.g. "scheduler", "planning").
    pub source: &'static str,
    /// Event type identifier (e.g. "stage_failure", "dependency_deadlock").
    pub event_type: &'static str,
    pub message: String,
    /// JSON object with event-specific fields.
    pub payload: Value,
}

impl RunEvent {
    pub fn new(
        run_id: impl Into<String>,
        source: &'static str,
        event_type: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            source,
            event_type,
            message: message.into(),
            payload: Value::Object(Default::default()),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Write-only sink for run events.
///
/// `record` is synchronous and non-fallible so that a broken log never
/// disrupts a run; implementations swallow their own I/O errors.
pub trait EventSink: Send + Sync {
    fn record(&self, event: RunEvent);
}

/// No-op implementation for tests and when event logging is disabled.
pub struct NoEventSink;

impl EventSink for NoEventSink {
    fn record(&self, _event: RunEvent) {}
}
