//! JSONL file writer for run events.
//!
//! Each [`RunEvent`] is serialized as a single JSON line carrying `runId`,
//! `source`, `type`, `message` and `timestamp` next to the flattened payload
//! fields, appended to the file via a buffered writer.

use conductor_application::{EventSink, RunEvent};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// File name used inside a run directory.
pub const EVENTS_FILE: &str = "events.jsonl";

/// JSONL event sink that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlEventSink {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlEventSink {
    /// Open the sink at the given path, appending to an existing file.
    ///
    /// Creates parent directories if they don't exist.
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create event log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open event log {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Build the JSON record for one event.
///
/// Payload fields are flattened to the top level; the fixed fields win
/// over payload keys of the same name. Non-object payloads go under `data`.
fn to_record(event: RunEvent, timestamp: String) -> Value {
    let mut map = match event.payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.insert("runId".to_string(), Value::String(event.run_id));
    map.insert("source".to_string(), Value::String(event.source.to_string()));
    map.insert("type".to_string(), Value::String(event.event_type.to_string()));
    map.insert("message".to_string(), Value::String(event.message));
    map.insert("timestamp".to_string(), Value::String(timestamp));
    Value::Object(map)
}

impl EventSink for JsonlEventSink {
    fn record(&self, event: RunEvent) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let record = to_record(event, timestamp);

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlEventSink {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_sink_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join(EVENTS_FILE);
        let sink = JsonlEventSink::new(&path).unwrap();

        sink.record(
            RunEvent::new("run-1", "scheduler", "stage_failure", "step 3 failed").with_payload(
                json!({
                    "stepId": 3,
                    "role": "builder",
                }),
            ),
        );
        sink.record(RunEvent::new(
            "run-1",
            "convergence",
            "iteration_complete",
            "iteration 1",
        ));
        drop(sink);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);

        assert_eq!(lines[0]["runId"], "run-1");
        assert_eq!(lines[0]["source"], "scheduler");
        assert_eq!(lines[0]["type"], "stage_failure");
        assert_eq!(lines[0]["message"], "step 3 failed");
        assert_eq!(lines[0]["stepId"], 3);
        assert_eq!(lines[0]["role"], "builder");
        assert!(lines[0]["timestamp"].as_str().unwrap().ends_with('Z'));

        assert_eq!(lines[1]["type"], "iteration_complete");
    }

    #[test]
    fn test_fixed_fields_win_over_payload() {
        let event = RunEvent::new("run-2", "planning", "plan_rejected", "bad plan")
            .with_payload(json!({ "type": "spoofed", "attempt": 2 }));
        let record = to_record(event, "t".to_string());
        assert_eq!(record["type"], "plan_rejected");
        assert_eq!(record["attempt"], 2);
    }

    #[test]
    fn test_non_object_payload_goes_under_data() {
        let event =
            RunEvent::new("run-3", "planning", "raw", "m").with_payload(json!(["a", "b"]));
        let record = to_record(event, "t".to_string());
        assert_eq!(record["data"], json!(["a", "b"]));
    }

    #[test]
    fn test_sink_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EVENTS_FILE);

        let first = JsonlEventSink::new(&path).unwrap();
        first.record(RunEvent::new("r", "s", "a", "one"));
        drop(first);

        let second = JsonlEventSink::new(&path).unwrap();
        second.record(RunEvent::new("r", "s", "b", "two"));
        assert_eq!(second.path(), path.as_path());
        drop(second);

        assert_eq!(read_lines(&path).len(), 2);
    }
}
