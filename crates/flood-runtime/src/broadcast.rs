//! Broadcast dispatch - record a value once, forward it once
//!
//! The check-then-insert on the SeenSet and the neighbor snapshot happen under
//! the SeenSet write lock. Everything after that (the reply and the forwards)
//! runs without any lock held. Forwards are detached tasks: never awaited,
//! never retried; a failed forward is logged and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use flood_core::{FloodError, FloodResult, NodeId, Origin, Value};
use flood_transport::{Outbox, Request, TaskGroup, Transport};
use flood_wire::{Body, BroadcastRequest};

use crate::{NeighborTable, SeenSet};

#[derive(Debug, Default)]
struct BroadcastStats {
    accepted: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    forwarded: AtomicU64,
    forward_failures: AtomicU64,
}

/// Point-in-time broadcast counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastCounters {
    /// Novel values recorded
    pub accepted: u64,
    /// Repeats absorbed without forwarding
    pub duplicates: u64,
    /// Requests failing validation
    pub rejected: u64,
    /// Forwards handed to the transport
    pub forwarded: u64,
    /// Forwards the transport refused
    pub forward_failures: u64,
}

/// Handles `broadcast` requests from clients and peers
pub struct BroadcastDispatcher<T: Transport> {
    seen: Arc<SeenSet>,
    neighbors: Arc<NeighborTable>,
    outbox: Arc<Outbox<T>>,
    tasks: TaskGroup,
    /// Skip the neighbor a peer-relayed value came from
    suppress_sender_echo: bool,
    stats: Arc<BroadcastStats>,
}

impl<T: Transport> BroadcastDispatcher<T> {
    pub fn new(
        seen: Arc<SeenSet>,
        neighbors: Arc<NeighborTable>,
        outbox: Arc<Outbox<T>>,
        tasks: TaskGroup,
        suppress_sender_echo: bool,
    ) -> Self {
        BroadcastDispatcher {
            seen,
            neighbors,
            outbox,
            tasks,
            suppress_sender_echo,
            stats: Arc::new(BroadcastStats::default()),
        }
    }

    pub fn handle(&self, request: &Request) -> FloodResult<()> {
        let value = match BroadcastRequest::from_body(request.body()) {
            Ok(req) => req.message,
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        let own_id = self.outbox.node_id().ok();
        let targets = self
            .seen
            .record_then(value, || self.fanout_targets(request, own_id.as_ref()));

        let Some(targets) = targets else {
            self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(value, src = %request.src(), "duplicate broadcast absorbed");
            self.acknowledge(request, value);
            return Ok(());
        };

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        debug!(
            value,
            src = %request.src(),
            fanout = targets.len(),
            "recorded broadcast"
        );

        self.acknowledge(request, value);
        for neighbor in targets {
            self.forward(neighbor, value);
        }
        Ok(())
    }

    /// Once the value is recorded the request has succeeded; a lost
    /// `broadcast_ok` is only logged.
    fn acknowledge(&self, request: &Request, value: Value) {
        if let Err(e) = self.outbox.reply(&request.envelope, Body::broadcast_ok()) {
            warn!(value, src = %request.src(), error = %e, "broadcast_ok not delivered");
        }
    }

    /// Neighbors to forward to, minus ourselves and (for peer relays) the sender
    fn fanout_targets(&self, request: &Request, own_id: Option<&NodeId>) -> Vec<NodeId> {
        let skip_sender = self.suppress_sender_echo && request.origin == Origin::Peer;

        self.neighbors
            .snapshot()
            .iter()
            .filter(|n| Some(*n) != own_id)
            .filter(|n| !(skip_sender && *n == request.src()))
            .cloned()
            .collect()
    }

    fn forward(&self, neighbor: NodeId, value: Value) {
        let outbox = self.outbox.clone();
        let stats = self.stats.clone();

        self.tasks.spawn(async move {
            match outbox.send(&neighbor, Body::broadcast(value)) {
                Ok(()) => {
                    stats.forwarded.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.forward_failures.fetch_add(1, Ordering::Relaxed);
                    let failure = FloodError::ForwardFailure {
                        dest: neighbor,
                        reason: e.to_string(),
                    };
                    warn!(value, error = %failure, "forward dropped");
                }
            }
        });
    }

    pub fn counters(&self) -> BroadcastCounters {
        BroadcastCounters {
            accepted: self.stats.accepted.load(Ordering::Relaxed),
            duplicates: self.stats.duplicates.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            forwarded: self.stats.forwarded.load(Ordering::Relaxed),
            forward_failures: self.stats.forward_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use crate::NodeConfig;
    use flood_wire::{kind, Envelope};
    use serde_json::json;

    #[tokio::test]
    async fn test_novel_value_forwarded_to_all_neighbors() {
        let h = Harness::with_neighbors(&["n2", "n3"]);

        let out = h.request("c1", json!({"type": "broadcast", "message": 42})).await;

        assert_eq!(h.replies(&out), vec![json!({"type": "broadcast_ok"})]);
        assert_eq!(h.forward_targets(&out), vec!["n2", "n3"]);
        assert_eq!(h.node.seen().snapshot(), vec![42]);
    }

    #[tokio::test]
    async fn test_repeat_is_absorbed() {
        let h = Harness::with_neighbors(&["n2", "n3"]);

        h.request("c1", json!({"type": "broadcast", "message": 5})).await;
        let out = h.request("c2", json!({"type": "broadcast", "message": 5})).await;

        assert_eq!(h.replies(&out), vec![json!({"type": "broadcast_ok"})]);
        assert!(h.forward_targets(&out).is_empty());

        let counters = h.node.counters();
        assert_eq!(counters.accepted, 1);
        assert_eq!(counters.duplicates, 1);
        assert_eq!(counters.forwarded, 2);
    }

    #[tokio::test]
    async fn test_missing_message_rejected() {
        let h = Harness::with_neighbors(&["n2"]);

        let out = h.request("c1", json!({"type": "broadcast"})).await;

        let reply = &h.replies(&out)[0];
        assert_eq!(reply["type"], kind::ERROR);
        assert_eq!(reply["code"], "invalid_request");
        assert!(reply["text"].as_str().unwrap().contains("missing"));
        assert!(h.forward_targets(&out).is_empty());
        assert!(h.node.seen().is_empty());
        assert_eq!(h.node.counters().rejected, 1);
    }

    #[tokio::test]
    async fn test_non_numeric_message_rejected() {
        let h = Harness::with_neighbors(&["n2"]);

        let out = h.request("c1", json!({"type": "broadcast", "message": "x"})).await;

        let reply = &h.replies(&out)[0];
        assert_eq!(reply["code"], "invalid_request");
        assert!(h.forward_targets(&out).is_empty());
        assert!(h.node.seen().is_empty());
    }

    #[tokio::test]
    async fn test_fractional_message_truncated() {
        let h = Harness::with_neighbors(&["n2"]);

        let out = h.request("c1", json!({"type": "broadcast", "message": 1.5})).await;

        assert_eq!(h.replies(&out), vec![json!({"type": "broadcast_ok"})]);
        assert_eq!(h.node.seen().snapshot(), vec![1]);
        let forward = out.iter().find(|e| !e.is_reply()).unwrap();
        assert_eq!(forward.body.field("message"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_failed_reply_is_not_a_handler_error() {
        let h = Harness::new();
        let seen = Arc::new(SeenSet::new());
        let neighbors = Arc::new(NeighborTable::new());
        neighbors.replace(vec![NodeId::from("n2")]);
        let dispatcher = BroadcastDispatcher::new(
            seen.clone(),
            neighbors,
            h.gateway.outbox(),
            h.gateway.tasks(),
            true,
        );
        h.transport.mark_unreachable("c1".into());

        let mut body = Body::broadcast(6);
        body.msg_id = Some(1);
        let request = Request {
            envelope: Envelope::new("c1".into(), "n1".into(), body),
            origin: Origin::Client,
        };

        assert!(dispatcher.handle(&request).is_ok());
        let out = h.settle().await;
        assert_eq!(h.forward_targets(&out), vec!["n2"]);
        assert_eq!(seen.snapshot(), vec![6]);
        assert_eq!(dispatcher.counters().forwarded, 1);
    }

    #[tokio::test]
    async fn test_peer_sender_not_echoed() {
        let h = Harness::with_neighbors(&["n2", "n3", "n4"]);

        let out = h.request("n2", json!({"type": "broadcast", "message": 8})).await;

        assert_eq!(h.forward_targets(&out), vec!["n3", "n4"]);
    }

    #[tokio::test]
    async fn test_client_sender_named_like_neighbor_still_forwarded() {
        // Only membership decides who is a peer
        let h = Harness::with_neighbors(&["n2", "c9"]);

        let out = h.request("c9", json!({"type": "broadcast", "message": 8})).await;

        assert_eq!(h.forward_targets(&out), vec!["c9", "n2"]);
    }

    #[tokio::test]
    async fn test_echo_suppression_can_be_disabled() {
        let h = Harness::configured(
            NodeConfig {
                suppress_sender_echo: false,
            },
            &["n2", "n3"],
        );

        let out = h.request("n2", json!({"type": "broadcast", "message": 8})).await;

        assert_eq!(h.forward_targets(&out), vec!["n2", "n3"]);
    }

    #[tokio::test]
    async fn test_never_forwards_to_self() {
        let h = Harness::with_neighbors(&["n1", "n2"]);

        let out = h.request("c1", json!({"type": "broadcast", "message": 1})).await;

        assert_eq!(h.forward_targets(&out), vec!["n2"]);
    }

    #[tokio::test]
    async fn test_forward_failure_does_not_affect_reply() {
        let h = Harness::with_neighbors(&["n2", "n3"]);
        h.transport.mark_unreachable("n3".into());

        let out = h.request("c1", json!({"type": "broadcast", "message": 11})).await;

        assert_eq!(h.replies(&out), vec![json!({"type": "broadcast_ok"})]);
        assert_eq!(h.forward_targets(&out), vec!["n2"]);
        let counters = h.node.counters();
        assert_eq!(counters.forwarded, 1);
        assert_eq!(counters.forward_failures, 1);

        // the node keeps serving
        let out = h.request("c1", json!({"type": "read"})).await;
        assert_eq!(h.replies(&out)[0]["messages"], json!([11]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_repeats_forward_once() {
        let h = Harness::with_neighbors(&["n2", "n3"]);

        for i in 0..64 {
            h.dispatch(&format!("c{}", i % 4), json!({"type": "broadcast", "message": 77}));
        }
        let out = h.settle().await;

        assert_eq!(h.forward_targets(&out), vec!["n2", "n3"]);
        assert_eq!(h.replies(&out).len(), 64);
        let counters = h.node.counters();
        assert_eq!(counters.accepted, 1);
        assert_eq!(counters.duplicates, 63);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_values_all_recorded() {
        let h = Harness::with_neighbors(&["n2"]);

        for value in [1, 2, 3] {
            h.dispatch("c1", json!({"type": "broadcast", "message": value}));
        }
        h.settle().await;

        let out = h.request("c1", json!({"type": "read"})).await;
        assert_eq!(h.replies(&out)[0]["messages"], json!([1, 2, 3]));
    }
}
