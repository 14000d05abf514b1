//! Single-node test harness over the in-memory transport

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value as Json;

use flood_core::NodeId;
use flood_transport::{Gateway, MemoryTransport};
use flood_wire::{kind, Envelope};

use crate::{Node, NodeConfig};

/// Node `n1` of the cluster `[n1, n2, n3, n4]`
pub(crate) struct Harness {
    pub transport: Arc<MemoryTransport>,
    pub gateway: Gateway<MemoryTransport>,
    pub node: Arc<Node<MemoryTransport>>,
    next_msg_id: AtomicU64,
}

impl Harness {
    pub fn uninitialized() -> Self {
        Self::build(NodeConfig::default())
    }

    pub fn new() -> Self {
        let h = Self::uninitialized();
        h.init();
        h
    }

    pub fn with_neighbors(neighbors: &[&str]) -> Self {
        Self::configured(NodeConfig::default(), neighbors)
    }

    pub fn configured(config: NodeConfig, neighbors: &[&str]) -> Self {
        let h = Self::build(config);
        h.init();
        h.node
            .neighbors()
            .replace(neighbors.iter().map(|n| NodeId::from(*n)).collect());
        h
    }

    fn build(config: NodeConfig) -> Self {
        let transport = Arc::new(MemoryTransport::new());
        let mut gateway = Gateway::new(transport.clone());
        let node = Node::attach(&mut gateway, config);
        Harness {
            transport,
            gateway,
            node,
            next_msg_id: AtomicU64::new(1000),
        }
    }

    fn init(&self) {
        self.dispatch(
            "c0",
            serde_json::json!({
                "type": kind::INIT,
                "node_id": "n1",
                "node_ids": ["n1", "n2", "n3", "n4"]
            }),
        );
        self.transport.take();
    }

    /// Deliver a request to n1 without waiting for it
    pub fn dispatch(&self, src: &str, body: Json) {
        let mut body: flood_wire::Body =
            serde_json::from_value(body).expect("test body must be a valid message body");
        body.msg_id = Some(self.next_msg_id.fetch_add(1, Ordering::Relaxed));
        self.gateway
            .dispatch(Envelope::new(src.into(), "n1".into(), body));
    }

    /// Wait for every handler and forward, then collect what was sent
    pub async fn settle(&self) -> Vec<Envelope> {
        self.gateway.tasks().drain().await;
        self.transport.take()
    }

    pub async fn request(&self, src: &str, body: Json) -> Vec<Envelope> {
        self.dispatch(src, body);
        self.settle().await
    }

    /// Reply bodies with the id bookkeeping stripped
    pub fn replies(&self, out: &[Envelope]) -> Vec<Json> {
        out.iter()
            .filter(|e| e.is_reply())
            .map(|e| {
                let mut body = serde_json::to_value(&e.body).expect("body serializes");
                if let Some(map) = body.as_object_mut() {
                    map.remove("msg_id");
                    map.remove("in_reply_to");
                }
                body
            })
            .collect()
    }

    /// Sorted destinations of outbound broadcast forwards
    pub fn forward_targets(&self, out: &[Envelope]) -> Vec<String> {
        let mut targets: Vec<String> = out
            .iter()
            .filter(|e| !e.is_reply() && e.msg_type() == kind::BROADCAST)
            .map(|e| e.dest.to_string())
            .collect();
        targets.sort();
        targets
    }
}
