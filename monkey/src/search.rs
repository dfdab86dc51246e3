use crate::node::UiNode;
use crate::query::AttributeQuery;
use tracing::{debug, instrument};

/// Collects the nodes matching `query`, in pre-order.
///
/// Only the root and its visible descendants are inspected: an invisible
/// node hides its whole subtree. Absent children are skipped. Returns an
/// empty list when there is no root.
#[instrument(level = "debug", skip(root), fields(query = %query))]
pub fn search(root: Option<&UiNode>, query: &AttributeQuery) -> Vec<UiNode> {
    let Some(root) = root else {
        debug!("No root to search");
        return Vec::new();
    };

    let mut found = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if query.matches(&node.attributes()) {
            found.push(node.clone());
        }
        let children: Vec<UiNode> = node.visible_children().map(|(_, child)| child).collect();
        // Reverse so the first child is popped next
        stack.extend(children.into_iter().rev());
    }

    debug!(matches = found.len(), "Search finished");
    found
}
