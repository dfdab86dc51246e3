//! In-memory device backing tests and dry runs.
//!
//! Trees are described with [`MemoryNodeSpec`] (JSON-loadable, `null` marks a
//! child the platform fails to produce) and instantiated on a
//! [`MemoryDevice`], which records every action the engine performs.

use crate::errors::MonkeyError;
use crate::node::{Bounds, NodeAction, UiNode, UiNodeAttributes, UiNodeImpl};
use crate::platforms::{GlobalAction, SessionHost, SessionStatus, TreeProvider};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Description of a node and its children
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryNodeSpec {
    #[serde(flatten)]
    pub attributes: UiNodeAttributes,
    #[serde(default)]
    pub children: Vec<Option<MemoryNodeSpec>>,
}

impl MemoryNodeSpec {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            attributes: UiNodeAttributes {
                class_name: class_name.into(),
                ..Default::default()
            },
            children: Vec::new(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.attributes.text = text.into();
        self
    }

    pub fn resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.attributes.resource_id = resource_id.into();
        self
    }

    pub fn package(mut self, package_name: impl Into<String>) -> Self {
        self.attributes.package_name = package_name.into();
        self
    }

    pub fn content_desc(mut self, content_desc: impl Into<String>) -> Self {
        self.attributes.content_desc = content_desc.into();
        self
    }

    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.attributes.bounds = bounds;
        self
    }

    pub fn clickable(mut self) -> Self {
        self.attributes.clickable = true;
        self
    }

    pub fn scrollable(mut self) -> Self {
        self.attributes.scrollable = true;
        self
    }

    pub fn checkable(mut self, checked: bool) -> Self {
        self.attributes.checkable = true;
        self.attributes.checked = checked;
        self
    }

    pub fn invisible(mut self) -> Self {
        self.attributes.visible_to_user = false;
        self
    }

    pub fn child(mut self, child: MemoryNodeSpec) -> Self {
        self.children.push(Some(child));
        self
    }

    /// A child slot the platform reports but cannot produce
    pub fn absent_child(mut self) -> Self {
        self.children.push(None);
        self
    }

    /// Sets `package_name` on this node and every descendant
    pub fn in_package(mut self, package_name: &str) -> Self {
        self.attributes.package_name = package_name.to_string();
        self.children = self
            .children
            .into_iter()
            .map(|child| child.map(|c| c.in_package(package_name)))
            .collect();
        self
    }

    pub fn from_json(json: &str) -> Result<Self, MonkeyError> {
        serde_json::from_str(json)
            .map_err(|e| MonkeyError::PlatformError(format!("invalid tree description: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MonkeyError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MonkeyError::PlatformError(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

/// Everything a [`MemoryDevice`] was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    NodeAction {
        resource_id: String,
        action: NodeAction,
    },
    Global(GlobalAction),
    Launch(String),
    ClearAppData(String),
    CaptureLogs { package: String, set: u32 },
    InputDelivery(bool),
    Status { package: String, status: SessionStatus },
    Terminate,
}

type Journal = Arc<Mutex<Vec<DeviceEvent>>>;

fn record(journal: &Journal, event: DeviceEvent) {
    // A poisoned journal still holds everything recorded before the panic
    let mut events = journal.lock().unwrap_or_else(|e| e.into_inner());
    events.push(event);
}

#[derive(Debug)]
pub struct MemoryNode {
    attributes: RwLock<UiNodeAttributes>,
    children: Vec<Option<Arc<MemoryNode>>>,
    journal: Journal,
}

impl MemoryNode {
    fn build(spec: MemoryNodeSpec, journal: &Journal) -> Arc<Self> {
        let children = spec
            .children
            .into_iter()
            .map(|child| child.map(|c| MemoryNode::build(c, journal)))
            .collect();
        Arc::new(Self {
            attributes: RwLock::new(spec.attributes),
            children,
            journal: Arc::clone(journal),
        })
    }
}

impl UiNodeImpl for MemoryNode {
    fn attributes(&self) -> UiNodeAttributes {
        self.attributes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child(&self, index: usize) -> Option<UiNode> {
        self.children
            .get(index)
            .and_then(|child| child.clone())
            .map(|child| UiNode::from_arc(child as Arc<dyn UiNodeImpl>))
    }

    fn perform_action(&self, action: &NodeAction) -> Result<(), MonkeyError> {
        let mut attrs = self.attributes.write().unwrap_or_else(|e| e.into_inner());
        if !attrs.enabled {
            return Err(MonkeyError::ActionFailed(format!(
                "{} on disabled node '{}'",
                action.name(),
                attrs.resource_id
            )));
        }
        match action {
            NodeAction::Click if attrs.checkable => attrs.checked = !attrs.checked,
            NodeAction::SetText(text) => attrs.text = text.clone(),
            _ => {}
        }
        record(
            &self.journal,
            DeviceEvent::NodeAction {
                resource_id: attrs.resource_id.clone(),
                action: action.clone(),
            },
        );
        Ok(())
    }
}

/// A scripted device holding one foreground tree at a time
#[derive(Debug, Default)]
pub struct MemoryDevice {
    foreground: Mutex<Option<UiNode>>,
    journal: Journal,
    hidden_reads: AtomicUsize,
    fail_launch: AtomicBool,
    terminated: AtomicBool,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(spec: MemoryNodeSpec) -> Self {
        let device = Self::new();
        device.show(spec);
        device
    }

    /// Instantiates `spec` without bringing it to the foreground
    pub fn build(&self, spec: MemoryNodeSpec) -> UiNode {
        UiNode::from_arc(MemoryNode::build(spec, &self.journal) as Arc<dyn UiNodeImpl>)
    }

    /// Instantiates `spec` as the new foreground tree and returns its root
    pub fn show(&self, spec: MemoryNodeSpec) -> UiNode {
        let root = self.build(spec);
        *self.foreground_guard() = Some(root.clone());
        root
    }

    /// Makes the foreground tree unavailable until the next `show`
    pub fn clear_foreground(&self) {
        *self.foreground_guard() = None;
    }

    /// The next `reads` calls to `foreground_tree` return nothing
    pub fn hide_tree_for(&self, reads: usize) {
        self.hidden_reads.store(reads, Ordering::SeqCst);
    }

    pub fn fail_launches(&self, fail: bool) {
        self.fail_launch.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear_events(&self) {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn foreground_guard(&self) -> MutexGuard<'_, Option<UiNode>> {
        self.foreground.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TreeProvider for MemoryDevice {
    fn foreground_tree(&self) -> Option<UiNode> {
        let hidden = self
            .hidden_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if hidden.is_ok() {
            debug!("Foreground tree hidden for this read");
            return None;
        }
        self.foreground_guard().clone()
    }

    fn global_action(&self, action: GlobalAction) -> Result<(), MonkeyError> {
        debug!(%action, "Performing global action");
        record(&self.journal, DeviceEvent::Global(action));
        Ok(())
    }

    fn launch_app(&self, package: &str) -> Result<(), MonkeyError> {
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(MonkeyError::LaunchFailed(format!(
                "no launchable activity for {package}"
            )));
        }
        info!(package, "Launching app");
        record(&self.journal, DeviceEvent::Launch(package.to_string()));
        Ok(())
    }
}

impl SessionHost for MemoryDevice {
    fn clear_app_data(&self, package: &str) -> Result<(), MonkeyError> {
        record(&self.journal, DeviceEvent::ClearAppData(package.to_string()));
        Ok(())
    }

    fn capture_logs(&self, package: &str, set: u32) -> Result<(), MonkeyError> {
        record(
            &self.journal,
            DeviceEvent::CaptureLogs {
                package: package.to_string(),
                set,
            },
        );
        Ok(())
    }

    fn set_input_delivery(&self, enabled: bool) -> Result<(), MonkeyError> {
        record(&self.journal, DeviceEvent::InputDelivery(enabled));
        Ok(())
    }

    fn write_status(&self, package: &str, status: SessionStatus) -> Result<(), MonkeyError> {
        record(
            &self.journal,
            DeviceEvent::Status {
                package: package.to_string(),
                status,
            },
        );
        Ok(())
    }

    fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            warn!("Device already terminated");
            return;
        }
        record(&self.journal, DeviceEvent::Terminate);
    }
}
