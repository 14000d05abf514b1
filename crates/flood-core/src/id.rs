//! Identity types for the flood node
//!
//! Peer identifiers are opaque strings assigned by the cluster harness.
//! Nodes are named `n0`, `n1`, ... and clients `c0`, `c1`, ...; the naming
//! is only a fallback signal, membership from `init` is authoritative.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix the harness gives to client identifiers
pub const CLIENT_PREFIX: char = 'c';

/// Peer identifier - a node or a client
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier follows the client naming convention
    #[inline]
    pub fn has_client_prefix(&self) -> bool {
        self.0.starts_with(CLIENT_PREFIX)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// An external client
    Client,
    /// Another node of the cluster
    Peer,
}

impl Origin {
    /// Classify by naming convention. Only used before membership is known.
    pub fn from_prefix(sender: &NodeId) -> Self {
        if sender.has_client_prefix() {
            Origin::Client
        } else {
            Origin::Peer
        }
    }
}

/// Cluster view delivered by `init`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Membership {
    node_id: NodeId,
    /// Sorted, deduplicated
    node_ids: Vec<NodeId>,
}

impl Membership {
    pub fn new(node_id: NodeId, mut node_ids: Vec<NodeId>) -> Self {
        node_ids.sort();
        node_ids.dedup();
        Membership { node_id, node_ids }
    }

    /// This node's own identifier
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Every node of the cluster, sorted
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn is_member(&self, id: &NodeId) -> bool {
        self.node_ids.binary_search(id).is_ok()
    }

    /// Members are peers; anyone else is a client
    pub fn origin_of(&self, sender: &NodeId) -> Origin {
        if self.is_member(sender) {
            Origin::Peer
        } else {
            Origin::Client
        }
    }

    /// Position of a node in the sorted member list
    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.node_ids.binary_search(id).ok()
    }

    /// Position of this node in the sorted member list
    pub fn own_index(&self) -> Option<usize> {
        self.index_of(&self.node_id)
    }
}
