//! The node store: the tree of user-authored steps and the active pointer.
//!
//! `NodeStore` is the single owner of the [`Tree`]. Every mutating method
//! persists the whole tree before returning; the outcome of that save is
//! observable through [`NodeStore::last_save_ok`].
//!
//! Missing ids are treated as benign races rather than errors by `update`,
//! `delete` and `set_active`: a caller may act on a node that was removed a
//! moment earlier.

pub mod invalidation;

use std::fmt;
use std::sync::Arc;

use crate::dataset;
use crate::node::{Node, NodeId, Tree};
use crate::persist::{self, BlobStore, TREE_KEY};
use crate::shape::{self, Shape};

pub const MAX_TOTAL_NODES: usize = 10;
pub const MAX_TREE_DEPTH: usize = 5;

/// Caps on tree size and chain depth, enforced when nodes are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_nodes: usize,
    /// A root sits at depth 0, so chains hold at most `max_depth` nodes.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_nodes: MAX_TOTAL_NODES,
            max_depth: MAX_TREE_DEPTH,
        }
    }
}

/// A creation that would break one of the [`Limits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitExceeded {
    TooManyNodes { max: usize },
    TooDeep { max: usize },
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitExceeded::TooManyNodes { max } => write!(f, "Max {} nodes", max),
            LimitExceeded::TooDeep { max } => write!(f, "Max depth {}", max),
        }
    }
}

impl std::error::Error for LimitExceeded {}

/// Errors `NodeStore::add` can raise.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    Limit(LimitExceeded),
    MissingParent(NodeId),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Limit(e) => write!(f, "Limit exceeded: {}", e),
            StoreError::MissingParent(id) => write!(f, "Parent node {} does not exist", id),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Limit(e) => Some(e),
            StoreError::MissingParent(_) => None,
        }
    }
}

impl From<LimitExceeded> for StoreError {
    fn from(e: LimitExceeded) -> Self {
        StoreError::Limit(e)
    }
}

pub struct NodeStore {
    tree: Tree,
    limits: Limits,
    blobs: Arc<dyn BlobStore>,
    last_save_ok: bool,
}

impl fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStore")
            .field("tree", &self.tree)
            .field("limits", &self.limits)
            .field("last_save_ok", &self.last_save_ok)
            .finish()
    }
}

impl NodeStore {
    /// Empty store. Nothing is written until the first mutation.
    pub fn new(blobs: Arc<dyn BlobStore>, limits: Limits) -> Self {
        NodeStore {
            tree: Tree::new(),
            limits,
            blobs,
            last_save_ok: true,
        }
    }

    /// Restore the tree persisted under [`TREE_KEY`], or start empty.
    ///
    /// A stored tree that breaks the forest invariants is discarded. Limits
    /// are not applied retroactively to a restored tree.
    pub fn open(blobs: Arc<dyn BlobStore>, limits: Limits) -> Self {
        let mut store = Self::new(blobs, limits);
        if let Some(tree) = persist::load_json::<Tree>(store.blobs.as_ref(), TREE_KEY) {
            match tree.validate() {
                Ok(()) => {
                    tracing::debug!(nodes = tree.len(), "restored node tree");
                    store.tree = tree;
                }
                Err(defect) => {
                    tracing::warn!(%defect, "discarding corrupt stored tree");
                }
            }
        }
        store
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Whether the save triggered by the most recent mutation succeeded.
    pub fn last_save_ok(&self) -> bool {
        self.last_save_ok
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.tree.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.tree.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.tree.nodes.values()
    }

    pub fn active_id(&self) -> Option<&NodeId> {
        self.tree.active_id.as_ref()
    }

    pub fn active_node(&self) -> Option<&Node> {
        self.tree.active_id.as_ref().and_then(|id| self.get(id))
    }

    // ------------------------------------------------------------------
    // Tree-shape queries
    // ------------------------------------------------------------------

    /// Number of ancestors above `id`; roots (and unknown ids) are at depth 0.
    pub fn depth(&self, id: &NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id);
        while let Some(parent) = current.and_then(|n| n.parent_id.as_ref()) {
            depth += 1;
            if depth > self.tree.len() {
                break;
            }
            current = self.get(parent);
        }
        depth
    }

    pub fn is_leaf(&self, id: &NodeId) -> bool {
        !self.nodes().any(|n| n.parent_id.as_ref() == Some(id))
    }

    /// Direct children of `parent`; `None` lists the roots.
    pub fn children(&self, parent: Option<&NodeId>) -> Vec<&Node> {
        self.nodes()
            .filter(|n| n.parent_id.as_ref() == parent)
            .collect()
    }

    /// Whether `id` has at least one direct child.
    ///
    /// Only direct children are inspected; this is the check that gates
    /// deletion and the "edit affects other steps" warning.
    pub fn has_descendants(&self, id: &NodeId) -> bool {
        !self.children(Some(id)).is_empty()
    }

    /// Nodes from the root down to `id`, inclusive. Empty for `None` or an unknown id.
    pub fn ancestor_chain(&self, id: Option<&NodeId>) -> Vec<&Node> {
        let mut chain = Vec::new();
        let mut current = id.and_then(|id| self.get(id));
        while let Some(node) = current {
            chain.push(node);
            if chain.len() > self.tree.len() {
                break;
            }
            current = node.parent_id.as_ref().and_then(|p| self.get(p));
        }
        chain.reverse();
        chain
    }

    /// Input shape for a step attached under `parent`.
    pub fn parent_shape(&self, parent: Option<&NodeId>) -> Shape {
        parent
            .and_then(|id| self.get(id))
            .map(|n| n.shape.clone())
            .unwrap_or_else(dataset::base_shape)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn can_add(&self, parent: Option<&NodeId>) -> Result<(), LimitExceeded> {
        if self.tree.len() >= self.limits.max_nodes {
            return Err(LimitExceeded::TooManyNodes {
                max: self.limits.max_nodes,
            });
        }
        let depth = parent.map_or(0, |p| self.depth(p) + 1);
        if depth >= self.limits.max_depth {
            return Err(LimitExceeded::TooDeep {
                max: self.limits.max_depth,
            });
        }
        Ok(())
    }

    /// Create a node under `parent` and make it active.
    pub fn add(
        &mut self,
        parent: Option<NodeId>,
        prompt: impl Into<String>,
        fragment: impl Into<String>,
        shape: Shape,
    ) -> Result<NodeId, StoreError> {
        if let Some(parent) = &parent {
            if !self.contains(parent) {
                return Err(StoreError::MissingParent(parent.clone()));
            }
        }
        self.can_add(parent.as_ref())?;

        let id = NodeId::generate();
        let node = Node::new(id.clone(), parent, prompt, fragment, shape);
        tracing::debug!(node = %id, parent = ?node.parent_id, "adding node");
        self.tree.nodes.insert(id.clone(), node);
        self.tree.active_id = Some(id.clone());
        self.persist();
        Ok(id)
    }

    /// Replace a node's prompt, fragment and shape.
    ///
    /// Returns `false` (and changes nothing) if the node does not exist. When
    /// the new shape differs from the old one, every descendant is marked
    /// stale; shape-equal edits leave descendants alone.
    pub fn update(
        &mut self,
        id: &NodeId,
        prompt: impl Into<String>,
        fragment: impl Into<String>,
        shape: Shape,
    ) -> bool {
        let Some(node) = self.tree.nodes.get_mut(id) else {
            tracing::debug!(node = %id, "ignoring update of missing node");
            return false;
        };

        let shape_changed = !shape::equal(&node.shape, &shape);
        node.prompt = prompt.into();
        node.fragment = fragment.into();
        node.shape = shape;
        node.last_error = None;

        if shape_changed {
            let marked = invalidation::mark_descendants_stale(&mut self.tree, id);
            tracing::debug!(node = %id, marked, "shape changed, descendants marked stale");
        }
        self.persist();
        true
    }

    /// Remove a leaf. Nodes with children (and unknown ids) are left alone.
    pub fn delete(&mut self, id: &NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        if self.has_descendants(id) {
            tracing::debug!(node = %id, "refusing to delete node with children");
            return false;
        }

        let parent = node.parent_id.clone();
        self.tree.nodes.remove(id);
        if self.tree.active_id.as_ref() == Some(id) {
            self.tree.active_id = parent;
        }
        tracing::debug!(node = %id, "deleted node");
        self.persist();
        true
    }

    /// Point the active marker at `id`, or at the base dataset for `None`.
    pub fn set_active(&mut self, id: Option<&NodeId>) -> bool {
        if let Some(id) = id {
            if !self.contains(id) {
                return false;
            }
        }
        self.tree.active_id = id.cloned();
        self.persist();
        true
    }

    pub fn set_error(&mut self, id: &NodeId, message: Option<String>) -> bool {
        let Some(node) = self.tree.nodes.get_mut(id) else {
            return false;
        };
        node.last_error = message;
        self.persist();
        true
    }

    pub fn clear_stale(&mut self, id: &NodeId) -> bool {
        let Some(node) = self.tree.nodes.get_mut(id) else {
            return false;
        };
        node.is_stale = false;
        self.persist();
        true
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.tree = Tree::new();
        self.persist();
    }

    fn persist(&mut self) {
        self.last_save_ok = persist::save_json(self.blobs.as_ref(), TREE_KEY, &self.tree);
        if !self.last_save_ok {
            tracing::warn!("node tree was not persisted");
        }
    }
}
