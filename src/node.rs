//! Tree data model: nodes, their ids and the forest that holds them.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shape::Shape;

/// Placeholder token every fragment uses for its input relation.
pub const PARENT_PLACEHOLDER: &str = "{parent}";

/// Opaque, stable node identifier.
///
/// Ids are limited to ASCII alphanumerics and `_` because the compositor
/// derives a sub-query alias from them; that alias is spliced into query
/// text unquoted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

const PENDING_ID: &str = "pending";
const MAX_ID_LEN: usize = 64;

impl NodeId {
    /// Fresh id. UUIDv7 is time-ordered, so map order follows creation order.
    pub fn generate() -> Self {
        NodeId(uuid::Uuid::now_v7().simple().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidNodeId> {
        let valid = !raw.is_empty()
            && raw != PENDING_ID
            && raw.len() <= MAX_ID_LEN
            && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(NodeId(raw.to_string()))
        } else {
            Err(InvalidNodeId(raw.to_string()))
        }
    }

    /// Id bound to a proposed node while it is being validated. Reserved:
    /// `parse` never yields it, so it cannot collide with a stored node.
    pub fn pending() -> Self {
        NodeId(PENDING_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sub-query alias for this node inside a composed query.
    pub fn alias(&self) -> String {
        format!("node_{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeId {
    type Error = InvalidNodeId;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        NodeId::parse(&raw)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl std::str::FromStr for NodeId {
    type Err = InvalidNodeId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeId::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidNodeId(pub String);

impl fmt::Display for InvalidNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid node id '{}': expected 1-{} ASCII letters, digits or '_' (and not '{}')",
            self.0, MAX_ID_LEN, PENDING_ID
        )
    }
}

impl std::error::Error for InvalidNodeId {}

/// One user-authored transform step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    /// Natural-language request this step was generated from
    pub prompt: String,
    /// Query text with exactly one `{parent}` placeholder
    #[serde(rename = "sql")]
    pub fragment: String,
    #[serde(rename = "schema")]
    pub shape: Shape,
    #[serde(default)]
    pub is_stale: bool,
    #[serde(default, rename = "error")]
    pub last_error: Option<String>,
}

impl Node {
    pub fn new(
        id: NodeId,
        parent_id: Option<NodeId>,
        prompt: impl Into<String>,
        fragment: impl Into<String>,
        shape: Shape,
    ) -> Self {
        Node {
            id,
            parent_id,
            prompt: prompt.into(),
            fragment: fragment.into(),
            shape,
            is_stale: false,
            last_error: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// The whole forest plus the active-node pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tree {
    pub nodes: BTreeMap<NodeId, Node>,
    pub active_id: Option<NodeId>,
}

/// Ways a restored tree can violate the forest invariants.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeDefect {
    /// Map key and stored id disagree
    KeyMismatch(NodeId),
    DanglingParent { node: NodeId, parent: NodeId },
    Cycle(NodeId),
    DanglingActive(NodeId),
}

impl fmt::Display for TreeDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeDefect::KeyMismatch(id) => write!(f, "node stored under key {} has a different id", id),
            TreeDefect::DanglingParent { node, parent } => {
                write!(f, "node {} references missing parent {}", node, parent)
            }
            TreeDefect::Cycle(id) => write!(f, "node {} is part of a parent cycle", id),
            TreeDefect::DanglingActive(id) => write!(f, "active node {} does not exist", id),
        }
    }
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check the forest invariants on a tree that did not come from this process.
    pub fn validate(&self) -> Result<(), TreeDefect> {
        for (key, node) in &self.nodes {
            if *key != node.id {
                return Err(TreeDefect::KeyMismatch(key.clone()));
            }
            if let Some(parent) = &node.parent_id {
                if !self.nodes.contains_key(parent) {
                    return Err(TreeDefect::DanglingParent {
                        node: node.id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        for start in self.nodes.keys() {
            let mut seen = HashSet::new();
            let mut current = Some(start);
            while let Some(id) = current {
                if !seen.insert(id) {
                    return Err(TreeDefect::Cycle(start.clone()));
                }
                current = self.nodes.get(id).and_then(|n| n.parent_id.as_ref());
            }
        }

        match &self.active_id {
            Some(active) if !self.nodes.contains_key(active) => {
                Err(TreeDefect::DanglingActive(active.clone()))
            }
            _ => Ok(()),
        }
    }
}
