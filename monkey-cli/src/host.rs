use crate::log_capture::{LogCapture, LogEntry};
use monkey::{MonkeyError, SessionHost, SessionStatus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Logs captured while one set ran
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLogs {
    pub package_name: String,
    pub set: u32,
    pub entries: Vec<LogEntry>,
}

/// Session host for local runs.
///
/// Status markers and captured logs are written to the output directory;
/// device-level requests are forwarded to the wrapped host.
pub struct LocalHost {
    output_dir: PathBuf,
    capture: LogCapture,
    device: Arc<dyn SessionHost>,
    status: Mutex<Option<SessionStatus>>,
}

impl LocalHost {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        capture: LogCapture,
        device: Arc<dyn SessionHost>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            capture,
            device,
            status: Mutex::new(None),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Status written by the session, if it has finished
    pub fn status(&self) -> Option<SessionStatus> {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status_path(&self, package: &str, status: SessionStatus) -> PathBuf {
        self.output_dir
            .join(format!("{package}.{}", status.marker()))
    }

    pub fn log_path(&self, package: &str, set: u32) -> PathBuf {
        self.output_dir.join(format!("{package}{set}_log.json"))
    }
}

impl SessionHost for LocalHost {
    fn clear_app_data(&self, package: &str) -> Result<(), MonkeyError> {
        self.device.clear_app_data(package)
    }

    fn capture_logs(&self, package: &str, set: u32) -> Result<(), MonkeyError> {
        let logs = SetLogs {
            package_name: package.to_string(),
            set,
            entries: self.capture.drain(),
        };
        let path = self.log_path(package, set);
        let json = serde_json::to_string_pretty(&logs)
            .map_err(|e| MonkeyError::Host(format!("Failed to serialize logs: {e}")))?;
        std::fs::write(&path, json)
            .map_err(|e| MonkeyError::Host(format!("Failed to write {}: {e}", path.display())))?;
        info!(path = %path.display(), entries = logs.entries.len(), "Captured set logs");
        Ok(())
    }

    fn set_input_delivery(&self, enabled: bool) -> Result<(), MonkeyError> {
        self.device.set_input_delivery(enabled)
    }

    fn write_status(&self, package: &str, status: SessionStatus) -> Result<(), MonkeyError> {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = Some(status);
        let path = self.status_path(package, status);
        std::fs::write(&path, b"")
            .map_err(|e| MonkeyError::Host(format!("Failed to write {}: {e}", path.display())))?;
        match status {
            SessionStatus::Done => info!(path = %path.display(), "Session done"),
            SessionStatus::Failed => warn!(path = %path.display(), "Session failed"),
        }
        Ok(())
    }

    fn terminate(&self) {
        info!("Session requested termination");
        self.device.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkey::platforms::memory::{DeviceEvent, MemoryDevice};
    use tempfile::TempDir;

    fn host(dir: &TempDir) -> (LocalHost, Arc<MemoryDevice>) {
        let device = Arc::new(MemoryDevice::new());
        let capture = LogCapture::new(100);
        capture.start_capture();
        (LocalHost::new(dir.path(), capture, device.clone()), device)
    }

    #[test]
    fn test_status_marker_is_written() {
        let dir = TempDir::new().unwrap();
        let (host, _) = host(&dir);

        host.write_status("com.example", SessionStatus::Failed).unwrap();

        assert!(dir.path().join("com.example.failed").exists());
        assert!(!dir.path().join("com.example.done").exists());
        assert_eq!(host.status(), Some(SessionStatus::Failed));
    }

    #[test]
    fn test_logs_are_written_per_set() {
        let dir = TempDir::new().unwrap();
        let (host, _) = host(&dir);

        host.capture_logs("com.example", 0).unwrap();
        host.capture_logs("com.example", 1).unwrap();

        let json = std::fs::read_to_string(dir.path().join("com.example1_log.json")).unwrap();
        let logs: SetLogs = serde_json::from_str(&json).unwrap();
        assert_eq!(logs.package_name, "com.example");
        assert_eq!(logs.set, 1);
        assert!(logs.entries.is_empty());
        assert!(dir.path().join("com.example0_log.json").exists());
    }

    #[test]
    fn test_device_requests_are_forwarded() {
        let dir = TempDir::new().unwrap();
        let (host, device) = host(&dir);

        host.set_input_delivery(false).unwrap();
        host.clear_app_data("com.example").unwrap();
        host.terminate();

        assert_eq!(
            device.events(),
            vec![
                DeviceEvent::InputDelivery(false),
                DeviceEvent::ClearAppData("com.example".to_string()),
                DeviceEvent::Terminate,
            ]
        );
    }
}
