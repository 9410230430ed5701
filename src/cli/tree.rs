//! Text rendering of the step tree

use crate::dataset::BASE_RELATION;
use crate::node::{Node, NodeId};
use crate::store::NodeStore;

/// Render the tree one step per line, children indented under their parent.
///
/// The active entry (a step, or the base dataset) is marked with `*`.
pub fn render_tree(store: &NodeStore) -> String {
    let mut out = String::new();
    let marker = if store.active_id().is_none() { '*' } else { '-' };
    out.push_str(&format!("{} {} (base dataset)\n", marker, BASE_RELATION));
    render_children(store, None, 1, &mut out);
    out
}

fn render_children(store: &NodeStore, parent: Option<&NodeId>, level: usize, out: &mut String) {
    for node in store.children(parent) {
        out.push_str(&render_line(store, node, level));
        render_children(store, Some(&node.id), level + 1, out);
    }
}

fn render_line(store: &NodeStore, node: &Node, level: usize) -> String {
    let marker = if store.active_id() == Some(&node.id) { '*' } else { '-' };
    let mut line = format!("{}{} {}  {}", "  ".repeat(level), marker, node.id, node.prompt);
    if node.is_stale {
        line.push_str("  [stale]");
    }
    if let Some(error) = &node.last_error {
        line.push_str(&format!("  [error: {}]", error));
    }
    line.push('\n');
    line
}
