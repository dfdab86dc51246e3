//! Serializable snapshots of the visible part of a UI tree.
//!
//! Every log event carries one of these as its content. Text attributes are
//! reduced to printable ASCII so the log stays readable by tools that choke
//! on control characters.

use crate::node::UiNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classes that are never flagged as not-accessibility-friendly
const NAF_EXCLUDED_CLASSES: &[&str] = &[
    "android.widget.GridView",
    "android.widget.GridLayout",
    "android.widget.ListView",
    "android.widget.TableLayout",
];

/// A node of a tree dump with its visible children
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDump {
    pub index: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub naf: bool,
    pub text: String,
    pub resource_id: String,
    pub class: String,
    pub package: String,
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
    pub bounds: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDump>,
}

impl NodeDump {
    /// Dumps `root` and its visible descendants. Absent children are skipped.
    pub fn capture(root: &UiNode) -> Self {
        Self::capture_at(root, 0)
    }

    fn capture_at(node: &UiNode, index: usize) -> Self {
        let attrs = node.attributes();
        let naf = !NAF_EXCLUDED_CLASSES
            .iter()
            .any(|class| attrs.class_name.ends_with(class))
            && !naf_check(node);

        let children = node
            .visible_children()
            .map(|(child_index, child)| Self::capture_at(&child, child_index))
            .collect();

        Self {
            index,
            naf,
            text: safe_text(&attrs.text),
            resource_id: safe_text(&attrs.resource_id),
            class: safe_text(&attrs.class_name),
            package: safe_text(&attrs.package_name),
            content_desc: safe_text(&attrs.content_desc),
            checkable: attrs.checkable,
            checked: attrs.checked,
            clickable: attrs.clickable,
            enabled: attrs.enabled,
            focusable: attrs.focusable,
            focused: attrs.focused,
            scrollable: attrs.scrollable,
            long_clickable: attrs.long_clickable,
            password: attrs.password,
            selected: attrs.selected,
            bounds: attrs.bounds.to_short_string(),
            children,
        }
    }

    /// Number of nodes in this dump, including itself
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeDump::node_count).sum::<usize>()
    }

    fn debug_with_depth(
        &self,
        f: &mut fmt::Formatter<'_>,
        current_depth: usize,
        max_depth: usize,
    ) -> fmt::Result {
        let mut debug_struct = f.debug_struct("NodeDump");
        debug_struct.field("class", &self.class);
        if !self.text.is_empty() {
            debug_struct.field("text", &self.text);
        }
        if !self.resource_id.is_empty() {
            debug_struct.field("resource_id", &self.resource_id);
        }
        if self.naf {
            debug_struct.field("naf", &true);
        }

        if !self.children.is_empty() {
            if current_depth < max_depth {
                debug_struct.field(
                    "children",
                    &DebugChildrenWithDepth {
                        children: &self.children,
                        current_depth,
                        max_depth,
                    },
                );
            } else {
                debug_struct.field(
                    "children",
                    &format!("[{} children (depth limit reached)]", self.children.len()),
                );
            }
        }

        debug_struct.finish()
    }
}

impl fmt::Debug for NodeDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_with_depth(f, 0, 100)
    }
}

struct DebugChildrenWithDepth<'a> {
    children: &'a [NodeDump],
    current_depth: usize,
    max_depth: usize,
}

impl fmt::Debug for DebugChildrenWithDepth<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for child in self.children {
            list.entry(&DebugNodeWithDepth {
                node: child,
                current_depth: self.current_depth + 1,
                max_depth: self.max_depth,
            });
        }
        list.finish()
    }
}

struct DebugNodeWithDepth<'a> {
    node: &'a NodeDump,
    current_depth: usize,
    max_depth: usize,
}

impl fmt::Debug for DebugNodeWithDepth<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node
            .debug_with_depth(f, self.current_depth, self.max_depth)
    }
}

/// Replaces every character outside printable ASCII with `?`.
pub fn safe_text(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

/// `false` when the node is clickable and enabled yet neither it nor any
/// descendant carries text or a content description.
fn naf_check(node: &UiNode) -> bool {
    let attrs = node.attributes();
    let is_naf = attrs.clickable
        && attrs.enabled
        && attrs.content_desc.is_empty()
        && attrs.text.is_empty();
    if !is_naf {
        return true;
    }
    child_naf_check(node)
}

fn child_naf_check(node: &UiNode) -> bool {
    (0..node.child_count())
        .filter_map(|index| node.child(index))
        .any(|child| {
            let attrs = child.attributes();
            !attrs.content_desc.is_empty() || !attrs.text.is_empty() || child_naf_check(&child)
        })
}
