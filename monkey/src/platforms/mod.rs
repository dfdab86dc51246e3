use crate::errors::MonkeyError;
use crate::node::UiNode;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod memory;

/// Device-wide actions that are not tied to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlobalAction {
    Back,
    Recents,
}

impl fmt::Display for GlobalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalAction::Back => write!(f, "GLOBAL_ACTION_BACK"),
            GlobalAction::Recents => write!(f, "GLOBAL_ACTION_RECENTS"),
        }
    }
}

/// Final status of a session, written once for the target package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Done,
    Failed,
}

impl SessionStatus {
    /// Suffix of the status marker file
    pub fn marker(&self) -> &'static str {
        match self {
            SessionStatus::Done => "done",
            SessionStatus::Failed => "failed",
        }
    }
}

/// Source of live UI trees and device-level actions
pub trait TreeProvider: Send + Sync {
    /// Root of the window currently in the foreground, if the platform has one
    fn foreground_tree(&self) -> Option<UiNode>;

    fn global_action(&self, action: GlobalAction) -> Result<(), MonkeyError>;

    /// Brings `package` to the foreground
    fn launch_app(&self, package: &str) -> Result<(), MonkeyError>;
}

/// Side effects a session has on the environment hosting it
pub trait SessionHost: Send + Sync {
    /// Resets the persisted state of `package`. Requires elevated access.
    fn clear_app_data(&self, package: &str) -> Result<(), MonkeyError>;

    /// Persists the device log collected while `set` ran
    fn capture_logs(&self, package: &str, set: u32) -> Result<(), MonkeyError>;

    /// Enables or disables delivery of tree snapshots to the session
    fn set_input_delivery(&self, enabled: bool) -> Result<(), MonkeyError>;

    fn write_status(&self, package: &str, status: SessionStatus) -> Result<(), MonkeyError>;

    /// Ends the hosting process or service
    fn terminate(&self);
}
