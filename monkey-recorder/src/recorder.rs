use crate::{RecordedSet, RecorderError, Result};
use monkey::{ActionKind, EventJournal, EventSink, EventSource, LogEvent, MonkeyError, UiNode};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Where and for which app the recorder writes
#[derive(Debug, Clone)]
pub struct EventRecorderConfig {
    /// Directory receiving one `<package><set>.json` file per set
    pub output_dir: PathBuf,
    pub package_name: String,
}

impl EventRecorderConfig {
    pub fn new(output_dir: impl Into<PathBuf>, package_name: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            package_name: package_name.into(),
        }
    }
}

/// Event sink writing each set of a session to its own JSON file
pub struct EventRecorder {
    config: EventRecorderConfig,
    session_id: Uuid,
    journal: EventJournal,
    current: RecordedSet,
    written: Vec<PathBuf>,
    event_tx: broadcast::Sender<LogEvent>,
}

impl EventRecorder {
    pub fn new(config: EventRecorderConfig) -> Result<Self> {
        if config.package_name.is_empty() {
            return Err(RecorderError::InitializationError(
                "package name must not be empty".to_string(),
            ));
        }
        std::fs::create_dir_all(&config.output_dir).map_err(|e| {
            RecorderError::InitializationError(format!(
                "Failed to create {}: {e}",
                config.output_dir.display()
            ))
        })?;

        let session_id = Uuid::new_v4();
        let (event_tx, _) = broadcast::channel(100);
        info!(%session_id, output_dir = %config.output_dir.display(), "Recorder ready");

        Ok(Self {
            current: RecordedSet::new(session_id, config.package_name.clone(), 0),
            config,
            session_id,
            journal: EventJournal::new(),
            written: Vec::new(),
            event_tx,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Number of the set currently being recorded
    pub fn current_set(&self) -> u32 {
        self.current.set
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Files written so far, in order
    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }

    /// Stream of events as they are closed
    pub fn event_stream(&self) -> impl Stream<Item = LogEvent> {
        let mut rx = self.event_tx.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Event stream lagged, skipped {} events", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn store(&mut self, event: LogEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event.clone());
        self.current.add_event(event);
    }

    /// Writes the current set if it holds any events and starts the next one
    #[instrument(level = "debug", skip(self), fields(set = self.current.set))]
    pub fn finish_set(&mut self) -> Result<Option<PathBuf>> {
        let next = RecordedSet::new(
            self.session_id,
            self.config.package_name.clone(),
            self.current.set + 1,
        );
        let mut finished = std::mem::replace(&mut self.current, next);

        if finished.is_empty() {
            debug!("Set has no events, nothing to write");
            return Ok(None);
        }

        finished.finish();
        let path = self.config.output_dir.join(finished.file_name());
        finished.save_to_file(&path).map_err(|e| {
            RecorderError::SaveError(format!("Failed to write {}: {e}", path.display()))
        })?;
        info!(
            path = %path.display(),
            events = finished.events.len(),
            "Wrote set log"
        );
        self.written.push(path.clone());
        Ok(Some(path))
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("config", &self.config)
            .field("session_id", &self.session_id)
            .field("set", &self.current.set)
            .field("events", &self.current.events.len())
            .finish()
    }
}

impl EventSink for EventRecorder {
    fn open_event(&mut self, source: EventSource, root: &UiNode) -> std::result::Result<(), MonkeyError> {
        if let Some(dangling) = self.journal.open(source, root) {
            self.store(dangling);
        }
        Ok(())
    }

    fn append_action(
        &mut self,
        kind: ActionKind,
        resource_id: &str,
        value: &str,
    ) -> std::result::Result<(), MonkeyError> {
        self.journal.append(kind, resource_id, value).map(|_| ())
    }

    fn close_event(&mut self) -> std::result::Result<(), MonkeyError> {
        let event = self
            .journal
            .close()
            .ok_or_else(|| RecorderError::EventError("no open event to close".to_string()))?;
        self.store(event);
        Ok(())
    }

    fn close_file(&mut self) -> std::result::Result<(), MonkeyError> {
        self.finish_set()?;
        Ok(())
    }
}
