use crate::node::{NodeId, Tree};

/// Mark every strict descendant of `root` stale. Returns how many nodes were marked.
///
/// Fragments are opaque text, so there is no way to tell whether a
/// descendant actually reads the columns that changed; all of them are
/// marked.
pub fn mark_descendants_stale(tree: &mut Tree, root: &NodeId) -> usize {
    let descendants = descendants_of(tree, root);
    for id in &descendants {
        if let Some(node) = tree.nodes.get_mut(id) {
            node.is_stale = true;
        }
    }
    descendants.len()
}

/// Every strict descendant of `root`.
pub fn descendants_of(tree: &Tree, root: &NodeId) -> Vec<NodeId> {
    let mut found: Vec<NodeId> = Vec::new();
    let mut frontier = vec![root.clone()];

    while let Some(parent) = frontier.pop() {
        for node in tree.nodes.values() {
            if node.parent_id.as_ref() == Some(&parent) && !found.contains(&node.id) && node.id != *root {
                found.push(node.id.clone());
                frontier.push(node.id.clone());
            }
        }
    }

    found
}
