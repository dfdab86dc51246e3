use crate::Result;
use monkey::log::now_millis;
use monkey::LogEvent;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// The events of one set, as written to its log file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSet {
    pub session_id: Uuid,
    pub package_name: String,
    pub set: u32,
    /// Milliseconds since the Unix epoch
    pub start_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    pub events: Vec<LogEvent>,
}

impl RecordedSet {
    pub fn new(session_id: Uuid, package_name: impl Into<String>, set: u32) -> Self {
        Self {
            session_id,
            package_name: package_name.into(),
            set,
            start_time: now_millis(),
            end_time: None,
            events: Vec::new(),
        }
    }

    pub fn add_event(&mut self, event: LogEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Finish the recording
    pub fn finish(&mut self) {
        self.end_time = Some(now_millis());
    }

    /// File name of this set inside the output directory
    pub fn file_name(&self) -> String {
        format!("{}{}.json", self.package_name, self.set)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }
}
