//! Envelope = src + dest + body, serialized as a single JSON line

use serde::{Deserialize, Serialize};

use flood_core::{FloodError, FloodResult, NodeId};

use crate::Body;

/// A routed message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender
    pub src: NodeId,
    /// Recipient
    pub dest: NodeId,
    /// Type-tagged payload
    pub body: Body,
}

impl Envelope {
    pub fn new(src: NodeId, dest: NodeId, body: Body) -> Self {
        Envelope { src, dest, body }
    }

    /// Parse one line of input
    pub fn parse(line: &str) -> FloodResult<Self> {
        serde_json::from_str(line).map_err(|e| FloodError::MalformedEnvelope(e.to_string()))
    }

    /// Serialize to a single line (no trailing newline)
    pub fn to_line(&self) -> FloodResult<String> {
        serde_json::to_string(self).map_err(|e| FloodError::MalformedEnvelope(e.to_string()))
    }

    #[inline]
    pub fn msg_type(&self) -> &str {
        &self.body.msg_type
    }

    /// Replies carry the id of the request they answer
    #[inline]
    pub fn is_reply(&self) -> bool {
        self.body.in_reply_to.is_some()
    }
}
