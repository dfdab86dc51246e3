use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{layer::Context, Layer};

/// A single log entry captured while a set runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
}

/// Thread-safe buffer of log entries, drained once per set
#[derive(Clone)]
pub struct LogCapture {
    logs: Arc<Mutex<Vec<LogEntry>>>,
    capture_enabled: Arc<AtomicBool>,
    max_entries: usize,
}

impl LogCapture {
    pub fn new(max_entries: usize) -> Self {
        Self {
            logs: Arc::new(Mutex::new(Vec::new())),
            capture_enabled: Arc::new(AtomicBool::new(false)),
            max_entries,
        }
    }

    fn logs(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        // A panic while pushing leaves the buffer intact
        self.logs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start capturing logs, clearing any existing logs
    pub fn start_capture(&self) {
        self.capture_enabled.store(true, Ordering::SeqCst);
        self.logs().clear();
    }

    /// Stop capturing logs and return all captured entries
    pub fn stop_capture(&self) -> Vec<LogEntry> {
        self.capture_enabled.store(false, Ordering::SeqCst);
        self.drain()
    }

    /// Returns everything captured so far and keeps capturing
    pub fn drain(&self) -> Vec<LogEntry> {
        self.logs().drain(..).collect()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture_enabled.load(Ordering::SeqCst)
    }

    fn add_log(&self, entry: LogEntry) {
        if !self.is_capturing() {
            return;
        }

        let mut logs = self.logs();
        if logs.len() >= self.max_entries {
            logs.remove(0);
        }
        logs.push(entry);
    }

    pub fn log_count(&self) -> usize {
        self.logs().len()
    }
}

/// Tracing layer feeding a [`LogCapture`]
pub struct LogCaptureLayer {
    capture: LogCapture,
}

impl LogCaptureLayer {
    pub fn new(capture: LogCapture) -> Self {
        Self { capture }
    }
}

impl<S: Subscriber> Layer<S> for LogCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.capture.is_capturing() {
            return;
        }

        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();

        self.capture.add_log(LogEntry {
            timestamp: Utc::now(),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message: visitor.message,
            fields: (!visitor.fields.is_empty()).then_some(visitor.fields),
        });
    }
}

/// Collects the message and fields of one event. Counters such as `set` and
/// `rep` stay numeric; every other value is kept as its debug text.
#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl EntryVisitor {
    fn record(&mut self, field: &Field, value: Value) {
        match (field.name(), value) {
            ("message", Value::String(message)) => self.message = message,
            (name, value) => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for EntryVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, Value::String(value.to_string()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, Value::from(value));
    }
}
