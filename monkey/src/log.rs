//! Structured exploration log: events, the actions inside them, and the sink
//! trait the engine writes through.

use crate::dump::NodeDump;
use crate::errors::MonkeyError;
use crate::node::UiNode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    FillForm,
    Checkbox,
    Radiobutton,
    Click,
    Scroll,
    Back,
    Launch,
}

impl ActionKind {
    /// Primary actions end a pass; at most one is taken per pass
    pub fn is_primary(self) -> bool {
        matches!(
            self,
            ActionKind::Click | ActionKind::Scroll | ActionKind::Back | ActionKind::Launch
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::FillForm => "FillForm",
            ActionKind::Checkbox => "Checkbox",
            ActionKind::Radiobutton => "Radiobutton",
            ActionKind::Click => "Click",
            ActionKind::Scroll => "Scroll",
            ActionKind::Back => "Back",
            ActionKind::Launch => "Launch",
        };
        f.write_str(name)
    }
}

/// What triggered a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    Timer,
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "event_type")]
    pub kind: ActionKind,
    pub action_id: u32,
    pub resource_id: String,
    pub value: String,
}

/// One pass: the snapshot it saw and the actions it took
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub source: EventSource,
    pub event_id: u64,
    pub content: NodeDump,
    pub actions: Vec<Action>,
}

/// Receives the exploration log.
///
/// Implementations may fail; the engine logs such failures and carries on.
pub trait EventSink: Send {
    fn open_event(&mut self, source: EventSource, root: &UiNode) -> Result<(), MonkeyError>;

    fn append_action(
        &mut self,
        kind: ActionKind,
        resource_id: &str,
        value: &str,
    ) -> Result<(), MonkeyError>;

    fn close_event(&mut self) -> Result<(), MonkeyError>;

    /// Ends the current log file (one per set)
    fn close_file(&mut self) -> Result<(), MonkeyError>;
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Bookkeeping shared by sinks: holds the single open event and numbers
/// events and actions.
#[derive(Debug, Default)]
pub struct EventJournal {
    next_event_id: u64,
    open: Option<LogEvent>,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new event. An event left open by a previous pass is closed
    /// first and returned so the caller can still persist it.
    pub fn open(&mut self, source: EventSource, root: &UiNode) -> Option<LogEvent> {
        let dangling = self.open.take();
        if let Some(event) = &dangling {
            warn!(event_id = event.event_id, "Event was never closed, closing it now");
        }
        self.open = Some(LogEvent {
            timestamp: now_millis(),
            source,
            event_id: self.next_event_id,
            content: NodeDump::capture(root),
            actions: Vec::new(),
        });
        self.next_event_id += 1;
        dangling
    }

    pub fn append(
        &mut self,
        kind: ActionKind,
        resource_id: &str,
        value: &str,
    ) -> Result<&Action, MonkeyError> {
        let event = self
            .open
            .as_mut()
            .ok_or_else(|| MonkeyError::Sink(format!("no open event for {kind} action")))?;
        let action_id = event.actions.len() as u32;
        event.actions.push(Action {
            kind,
            action_id,
            resource_id: resource_id.to_string(),
            value: value.to_string(),
        });
        Ok(&event.actions[action_id as usize])
    }

    pub fn close(&mut self) -> Option<LogEvent> {
        self.open.take()
    }

    pub fn current(&self) -> Option<&LogEvent> {
        self.open.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn next_event_id(&self) -> u64 {
        self.next_event_id
    }
}

/// Closed events grouped by log file
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    pub files: Vec<Vec<LogEvent>>,
    pub current: Vec<LogEvent>,
}

impl MemoryLog {
    /// All closed events, including those of the file still being written
    pub fn events(&self) -> Vec<LogEvent> {
        self.files
            .iter()
            .flatten()
            .chain(self.current.iter())
            .cloned()
            .collect()
    }
}

/// Sink keeping the log in memory. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    journal: Arc<Mutex<EventJournal>>,
    log: Arc<Mutex<MemoryLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MemoryLog {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.snapshot().events()
    }

    pub fn has_open_event(&self) -> bool {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_open()
    }

    fn push(&self, event: LogEvent) -> Result<(), MonkeyError> {
        let mut log = self
            .log
            .lock()
            .map_err(|e| MonkeyError::Sink(format!("log lock poisoned: {e}")))?;
        log.current.push(event);
        Ok(())
    }
}

impl EventSink for MemorySink {
    fn open_event(&mut self, source: EventSource, root: &UiNode) -> Result<(), MonkeyError> {
        let dangling = self
            .journal
            .lock()
            .map_err(|e| MonkeyError::Sink(format!("journal lock poisoned: {e}")))?
            .open(source, root);
        match dangling {
            Some(event) => self.push(event),
            None => Ok(()),
        }
    }

    fn append_action(
        &mut self,
        kind: ActionKind,
        resource_id: &str,
        value: &str,
    ) -> Result<(), MonkeyError> {
        self.journal
            .lock()
            .map_err(|e| MonkeyError::Sink(format!("journal lock poisoned: {e}")))?
            .append(kind, resource_id, value)
            .map(|_| ())
    }

    fn close_event(&mut self) -> Result<(), MonkeyError> {
        let closed = self
            .journal
            .lock()
            .map_err(|e| MonkeyError::Sink(format!("journal lock poisoned: {e}")))?
            .close();
        match closed {
            Some(event) => self.push(event),
            None => Err(MonkeyError::Sink("no open event to close".to_string())),
        }
    }

    fn close_file(&mut self) -> Result<(), MonkeyError> {
        let mut log = self
            .log
            .lock()
            .map_err(|e| MonkeyError::Sink(format!("log lock poisoned: {e}")))?;
        let finished = std::mem::take(&mut log.current);
        log.files.push(finished);
        Ok(())
    }
}
