use crate::errors::MonkeyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Screen rectangle of a node, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// `[left,top][right,bottom]`, the form used in tree dumps
    pub fn to_short_string(&self) -> String {
        format!(
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

fn default_true() -> bool {
    true
}

/// Attributes of a node in the live UI tree
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiNodeAttributes {
    pub class_name: String,
    pub text: String,
    pub resource_id: String,
    pub package_name: String,
    pub content_desc: String,
    pub checkable: bool,
    pub checked: bool,
    pub clickable: bool,
    pub enabled: bool,
    pub focusable: bool,
    pub focused: bool,
    pub scrollable: bool,
    pub long_clickable: bool,
    pub password: bool,
    pub selected: bool,
    #[serde(default = "default_true")]
    pub visible_to_user: bool,
    pub bounds: Bounds,
}

impl Default for UiNodeAttributes {
    fn default() -> Self {
        Self {
            class_name: String::new(),
            text: String::new(),
            resource_id: String::new(),
            package_name: String::new(),
            content_desc: String::new(),
            checkable: false,
            checked: false,
            clickable: false,
            enabled: true,
            focusable: false,
            focused: false,
            scrollable: false,
            long_clickable: false,
            password: false,
            selected: false,
            visible_to_user: true,
            bounds: Bounds::default(),
        }
    }
}

impl fmt::Debug for UiNodeAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug_struct = f.debug_struct("UiNodeAttributes");

        for (name, value) in [
            ("class_name", &self.class_name),
            ("text", &self.text),
            ("resource_id", &self.resource_id),
            ("package_name", &self.package_name),
            ("content_desc", &self.content_desc),
        ] {
            if !value.is_empty() {
                debug_struct.field(name, value);
            }
        }

        // Only flags that are set
        for (name, value) in [
            ("checkable", self.checkable),
            ("checked", self.checked),
            ("clickable", self.clickable),
            ("focusable", self.focusable),
            ("focused", self.focused),
            ("scrollable", self.scrollable),
            ("long_clickable", self.long_clickable),
            ("password", self.password),
            ("selected", self.selected),
        ] {
            if value {
                debug_struct.field(name, &true);
            }
        }

        if !self.enabled {
            debug_struct.field("enabled", &false);
        }
        if !self.visible_to_user {
            debug_struct.field("visible_to_user", &false);
        }

        debug_struct.finish()
    }
}

/// An imperative action performed on a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAction {
    Click,
    ScrollForward,
    ScrollBackward,
    SetText(String),
}

impl NodeAction {
    pub fn name(&self) -> &'static str {
        match self {
            NodeAction::Click => "ACTION_CLICK",
            NodeAction::ScrollForward => "ACTION_SCROLL_FORWARD",
            NodeAction::ScrollBackward => "ACTION_SCROLL_BACKWARD",
            NodeAction::SetText(_) => "ACTION_SET_TEXT",
        }
    }
}

/// Interface for platform-specific node implementations
pub trait UiNodeImpl: Send + Sync + Debug {
    fn attributes(&self) -> UiNodeAttributes;
    fn child_count(&self) -> usize;
    /// `None` when the platform could not produce the child (recycled or gone)
    fn child(&self, index: usize) -> Option<UiNode>;
    fn perform_action(&self, action: &NodeAction) -> Result<(), MonkeyError>;

    fn set_text(&self, text: &str) -> Result<(), MonkeyError> {
        self.perform_action(&NodeAction::SetText(text.to_string()))
    }
}

/// Handle to a node of the live UI tree.
///
/// Handles are only meaningful while the snapshot they were read from is
/// current; the engine drops them at the end of each pass.
#[derive(Clone)]
pub struct UiNode {
    inner: Arc<dyn UiNodeImpl>,
}

impl UiNode {
    pub fn new(inner: impl UiNodeImpl + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn from_arc(inner: Arc<dyn UiNodeImpl>) -> Self {
        Self { inner }
    }

    pub fn attributes(&self) -> UiNodeAttributes {
        self.inner.attributes()
    }

    pub fn class_name(&self) -> String {
        self.inner.attributes().class_name
    }

    pub fn text(&self) -> String {
        self.inner.attributes().text
    }

    pub fn resource_id(&self) -> String {
        self.inner.attributes().resource_id
    }

    pub fn package_name(&self) -> String {
        self.inner.attributes().package_name
    }

    pub fn is_visible(&self) -> bool {
        self.inner.attributes().visible_to_user
    }

    pub fn is_checked(&self) -> bool {
        self.inner.attributes().checked
    }

    pub fn child_count(&self) -> usize {
        self.inner.child_count()
    }

    pub fn child(&self, index: usize) -> Option<UiNode> {
        self.inner.child(index)
    }

    /// Children that exist and are visible, with their index in the parent.
    /// Absent and invisible children are logged and skipped.
    pub fn visible_children(&self) -> impl Iterator<Item = (usize, UiNode)> + '_ {
        let count = self.child_count();
        (0..count).filter_map(move |index| match self.child(index) {
            Some(child) if child.is_visible() => Some((index, child)),
            Some(child) => {
                debug!(index, class = %child.class_name(), "Skipping invisible child");
                None
            }
            None => {
                debug!(index, count, parent = ?self, "Null child");
                None
            }
        })
    }

    pub fn perform_action(&self, action: &NodeAction) -> Result<(), MonkeyError> {
        self.inner.perform_action(action)
    }

    pub fn click(&self) -> Result<(), MonkeyError> {
        self.inner.perform_action(&NodeAction::Click)
    }

    pub fn scroll(&self, forward: bool) -> Result<(), MonkeyError> {
        if forward {
            self.inner.perform_action(&NodeAction::ScrollForward)
        } else {
            self.inner.perform_action(&NodeAction::ScrollBackward)
        }
    }

    pub fn set_text(&self, text: &str) -> Result<(), MonkeyError> {
        self.inner.set_text(text)
    }

    /// Whether both handles point at the same platform node
    pub fn same_node(&self, other: &UiNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for UiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UiNode")
            .field(&self.inner.attributes())
            .finish()
    }
}
