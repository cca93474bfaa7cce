//! Logging infrastructure: structured run-event logging.
//!
//! Provides [`JsonlEventSink`], a JSONL file writer that implements
//! the [`EventSink`](conductor_application::EventSink) port.

mod jsonl_logger;

pub use jsonl_logger::{EVENTS_FILE, JsonlEventSink};
