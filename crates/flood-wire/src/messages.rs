//! Message types, typed requests and reply bodies

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value as Json;

use flood_core::{ErrorCode, FloodResult, NodeId, Value};

use crate::Body;

/// Message type tags
pub mod kind {
    pub const INIT: &str = "init";
    pub const INIT_OK: &str = "init_ok";
    pub const ECHO: &str = "echo";
    pub const ECHO_OK: &str = "echo_ok";
    pub const GENERATE: &str = "generate";
    pub const GENERATE_OK: &str = "generate_ok";
    pub const BROADCAST: &str = "broadcast";
    pub const BROADCAST_OK: &str = "broadcast_ok";
    pub const READ: &str = "read";
    pub const READ_OK: &str = "read_ok";
    pub const TOPOLOGY: &str = "topology";
    pub const TOPOLOGY_OK: &str = "topology_ok";
    pub const ERROR: &str = "error";
}

/// Cluster membership handed to a node at startup
#[derive(Clone, Debug, Deserialize)]
pub struct InitRequest {
    pub node_id: NodeId,
    pub node_ids: Vec<NodeId>,
}

/// A value to record and disseminate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BroadcastRequest {
    pub message: Value,
}

impl BroadcastRequest {
    pub fn from_body(body: &Body) -> FloodResult<Self> {
        Ok(BroadcastRequest {
            message: body.require_integer("message")?,
        })
    }
}

/// Neighbor assignment for every node of the cluster
#[derive(Clone, Debug, Deserialize)]
pub struct TopologyRequest {
    pub topology: HashMap<NodeId, Vec<NodeId>>,
}

impl TopologyRequest {
    pub fn from_body(body: &Body) -> FloodResult<Self> {
        body.decode()
    }

    /// Neighbors assigned to `node`. A node absent from the mapping has none.
    pub fn neighbors_of(&mut self, node: &NodeId) -> Vec<NodeId> {
        self.topology.remove(node).unwrap_or_default()
    }
}

impl Body {
    pub fn init_ok() -> Self {
        Body::new(kind::INIT_OK)
    }

    /// The request body handed back with its type swapped
    pub fn echo_ok(request: &Body) -> Self {
        Body {
            msg_type: kind::ECHO_OK.to_string(),
            msg_id: None,
            in_reply_to: None,
            fields: request.fields.clone(),
        }
    }

    pub fn generate_ok(id: u64) -> Self {
        Body::new(kind::GENERATE_OK).with("id", id)
    }

    /// Peer-to-peer forward of a value
    pub fn broadcast(value: Value) -> Self {
        Body::new(kind::BROADCAST).with("message", value)
    }

    pub fn broadcast_ok() -> Self {
        Body::new(kind::BROADCAST_OK)
    }

    pub fn read_ok(values: &[Value]) -> Self {
        Body::new(kind::READ_OK).with("messages", values.to_vec())
    }

    pub fn topology_ok() -> Self {
        Body::new(kind::TOPOLOGY_OK)
    }

    pub fn error(code: ErrorCode, text: impl Into<String>) -> Self {
        let code = serde_json::to_value(code).unwrap_or(Json::Null);
        Body::new(kind::ERROR)
            .with("code", code)
            .with("text", text.into())
    }
}
