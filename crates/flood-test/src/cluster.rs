//! In-memory cluster of flood nodes
//!
//! Every node runs its real gateway and handlers. Envelopes between nodes go
//! through one shared `ClusterNetwork`, which applies chaos to peer links
//! only. Requests from the test client always arrive, and so do their replies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value as Json;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use flood_core::{FloodError, FloodResult, NodeId, Value};
use flood_runtime::{Node, NodeConfig};
use flood_transport::{Gateway, TaskGroup, Transport};
use flood_wire::{kind, Body, Envelope};

use crate::{Chaos, ChaosConfig, ChaosStats, Topology};

const CLIENT_ID: &str = "c1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);
const SETTLE_POLL: Duration = Duration::from_millis(1);

/// Shared transport for every node in a cluster
pub struct ClusterNetwork {
    inboxes: RwLock<HashMap<NodeId, mpsc::UnboundedSender<Envelope>>>,
    /// Client requests awaiting a reply, keyed by (client, msg_id)
    pending: Mutex<HashMap<(NodeId, u64), oneshot::Sender<Envelope>>>,
    chaos: Mutex<Chaos>,
    peer_log: Mutex<Vec<Envelope>>,
    /// Envelopes queued or delayed but not yet dispatched
    in_flight: Arc<AtomicUsize>,
    /// Bumped on every transmit and every dispatch
    activity: AtomicU64,
}

impl ClusterNetwork {
    fn new(chaos: ChaosConfig) -> Self {
        ClusterNetwork {
            inboxes: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            chaos: Mutex::new(Chaos::new(chaos)),
            peer_log: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            activity: AtomicU64::new(0),
        }
    }

    fn register(&self, node: NodeId, inbox: mpsc::UnboundedSender<Envelope>) {
        self.inboxes.write().insert(node, inbox);
    }

    fn route(&self, dest: &NodeId) -> FloodResult<mpsc::UnboundedSender<Envelope>> {
        self.inboxes
            .read()
            .get(dest)
            .cloned()
            .ok_or_else(|| FloodError::TransportError(format!("no route to {}", dest)))
    }

    fn deliver(&self, inbox: &mpsc::UnboundedSender<Envelope>, envelope: Envelope, delay: Duration) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        if delay.is_zero() {
            if inbox.send(envelope).is_err() {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            return;
        }

        let inbox = inbox.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if inbox.send(envelope).is_err() {
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        });
    }

    fn dispatched(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.activity.fetch_add(1, Ordering::SeqCst);
    }

    fn answer_client(&self, envelope: Envelope) -> FloodResult<()> {
        let waiter = envelope
            .body
            .in_reply_to
            .and_then(|id| self.pending.lock().remove(&(envelope.dest.clone(), id)));

        match waiter {
            Some(waiter) => {
                // the caller may have timed out already
                let _ = waiter.send(envelope);
                Ok(())
            }
            None => Err(FloodError::TransportError(format!(
                "no route to {}",
                envelope.dest
            ))),
        }
    }

    /// Send a request from a client and wait for its reply
    async fn call(&self, src: &NodeId, dest: &NodeId, body: Body) -> FloodResult<Envelope> {
        let msg_id = body.msg_id.ok_or_else(|| {
            FloodError::InvalidRequest("client request without msg_id".to_string())
        })?;
        let inbox = self.route(dest)?;

        let (tx, rx) = oneshot::channel();
        let key = (src.clone(), msg_id);
        self.pending.lock().insert(key.clone(), tx);

        self.activity.fetch_add(1, Ordering::SeqCst);
        self.deliver(&inbox, Envelope::new(src.clone(), dest.clone(), body), Duration::ZERO);

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(FloodError::TransportClosed),
            Err(_) => {
                self.pending.lock().remove(&key);
                Err(FloodError::TransportError(format!(
                    "{} did not answer within {:?}",
                    dest, REQUEST_TIMEOUT
                )))
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn activity(&self) -> u64 {
        self.activity.load(Ordering::SeqCst)
    }

    /// Every node-to-node envelope handed to the network, before chaos
    pub fn peer_messages(&self) -> Vec<Envelope> {
        self.peer_log.lock().clone()
    }

    pub fn chaos_stats(&self) -> ChaosStats {
        self.chaos.lock().stats().clone()
    }
}

impl Transport for ClusterNetwork {
    fn transmit(&self, envelope: Envelope) -> FloodResult<()> {
        self.activity.fetch_add(1, Ordering::SeqCst);

        if !self.inboxes.read().contains_key(&envelope.dest) {
            return self.answer_client(envelope);
        }
        let inbox = self.route(&envelope.dest)?;

        self.peer_log.lock().push(envelope.clone());
        let delivery = self.chaos.lock().plan();
        match delivery.copies {
            0 => debug!(
                src = %envelope.src,
                dest = %envelope.dest,
                msg_type = envelope.msg_type(),
                "peer message lost"
            ),
            1 => {}
            copies => trace!(
                src = %envelope.src,
                dest = %envelope.dest,
                copies,
                "peer message duplicated"
            ),
        }

        for delay in delivery.delays {
            self.deliver(&inbox, envelope.clone(), delay);
        }
        Ok(())
    }
}

struct Member {
    id: NodeId,
    node: Arc<Node<ClusterNetwork>>,
    tasks: TaskGroup,
    runner: JoinHandle<()>,
}

/// A running cluster plus one client to drive it
pub struct Cluster {
    network: Arc<ClusterNetwork>,
    members: Vec<Member>,
    client: NodeId,
    next_msg_id: AtomicU64,
}

impl Cluster {
    /// Start `n` initialized nodes named `n0..n{n-1}` with default config
    pub async fn start(n: usize, chaos: ChaosConfig) -> FloodResult<Self> {
        Self::start_with(n, chaos, NodeConfig::default()).await
    }

    pub async fn start_with(n: usize, chaos: ChaosConfig, config: NodeConfig) -> FloodResult<Self> {
        let network = Arc::new(ClusterNetwork::new(chaos));

        let members = (0..n)
            .map(|i| {
                let id = NodeId::new(format!("n{}", i));
                let mut gateway = Gateway::new(network.clone());
                let node = Node::attach(&mut gateway, config.clone());
                let tasks = gateway.tasks();

                let (tx, rx) = mpsc::unbounded_channel();
                network.register(id.clone(), tx);
                let runner = spawn_runner(gateway, rx, network.clone());

                Member {
                    id,
                    node,
                    tasks,
                    runner,
                }
            })
            .collect();

        let cluster = Cluster {
            network,
            members,
            client: NodeId::new(CLIENT_ID),
            next_msg_id: AtomicU64::new(1),
        };
        cluster.init_all().await?;
        Ok(cluster)
    }

    async fn init_all(&self) -> FloodResult<()> {
        let node_ids: Vec<&str> = self.members.iter().map(|m| m.id.as_str()).collect();

        for member in &self.members {
            let body = Body::new(kind::INIT)
                .with("node_id", member.id.as_str())
                .with("node_ids", node_ids.clone());
            expect(self.call(&member.id, body).await?, kind::INIT_OK)?;
        }
        debug!(nodes = self.members.len(), "cluster initialized");
        Ok(())
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    pub fn node(&self, id: &str) -> Option<&Arc<Node<ClusterNetwork>>> {
        self.members
            .iter()
            .find(|m| m.id.as_str() == id)
            .map(|m| &m.node)
    }

    pub fn network(&self) -> &ClusterNetwork {
        &self.network
    }

    async fn call(&self, dest: &NodeId, mut body: Body) -> FloodResult<Envelope> {
        body.msg_id = Some(self.next_msg_id.fetch_add(1, Ordering::Relaxed));
        self.network.call(&self.client, dest, body).await
    }

    /// Send any request to `node` and return its reply, whatever the type
    pub async fn request(&self, node: &str, body: Body) -> FloodResult<Envelope> {
        self.call(&NodeId::from(node), body).await
    }

    /// Send every node its entry of `topology`
    pub async fn assign(&self, topology: &Topology) -> FloodResult<()> {
        let payload: serde_json::Map<String, Json> = topology
            .iter()
            .map(|(node, neighbors)| {
                let neighbors: Vec<&str> = neighbors.iter().map(NodeId::as_str).collect();
                (node.to_string(), Json::from(neighbors))
            })
            .collect();

        for member in &self.members {
            let body = Body::new(kind::TOPOLOGY).with("topology", Json::Object(payload.clone()));
            expect(self.call(&member.id, body).await?, kind::TOPOLOGY_OK)?;
        }
        Ok(())
    }

    pub async fn broadcast(&self, node: &str, value: Value) -> FloodResult<()> {
        let reply = self.request(node, Body::broadcast(value)).await?;
        expect(reply, kind::BROADCAST_OK).map(|_| ())
    }

    pub async fn read(&self, node: &str) -> FloodResult<Vec<Value>> {
        let reply = expect(self.request(node, Body::new(kind::READ)).await?, kind::READ_OK)?;
        let messages = reply.body.field("messages").cloned().unwrap_or(Json::Null);
        serde_json::from_value(messages).map_err(|e| FloodError::MalformedEnvelope(e.to_string()))
    }

    /// Wait until no envelope is queued or delayed and no handler or forward is running
    pub async fn settle(&self) -> FloodResult<()> {
        let quiet = async {
            loop {
                let before = self.network.activity();
                let idle = self.network.in_flight() == 0
                    && self.members.iter().all(|m| m.tasks.active() == 0);
                if idle && self.network.activity() == before {
                    return;
                }
                tokio::time::sleep(SETTLE_POLL).await;
            }
        };

        tokio::time::timeout(SETTLE_TIMEOUT, quiet)
            .await
            .map_err(|_| {
                FloodError::TransportError(format!(
                    "cluster still busy after {:?} ({} in flight)",
                    SETTLE_TIMEOUT,
                    self.network.in_flight()
                ))
            })
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for member in &self.members {
            member.runner.abort();
        }
    }
}

fn spawn_runner(
    gateway: Gateway<ClusterNetwork>,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    network: Arc<ClusterNetwork>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = inbox.recv().await {
            gateway.dispatch(envelope);
            network.dispatched();
        }
    })
}

fn expect(reply: Envelope, ok_type: &str) -> FloodResult<Envelope> {
    if reply.msg_type() == ok_type {
        return Ok(reply);
    }
    Err(FloodError::TransportError(format!(
        "expected {} from {}, got {} ({})",
        ok_type,
        reply.src,
        reply.msg_type(),
        reply
            .body
            .field("text")
            .and_then(Json::as_str)
            .unwrap_or("no text")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology;

    #[tokio::test]
    async fn test_start_initializes_every_node() {
        let cluster = Cluster::start(3, ChaosConfig::reliable()).await.unwrap();

        assert_eq!(cluster.node_ids().len(), 3);
        for id in ["n0", "n1", "n2"] {
            let reply = cluster.request(id, Body::new(kind::GENERATE)).await.unwrap();
            assert_eq!(reply.msg_type(), kind::GENERATE_OK);
            assert_eq!(reply.src.as_str(), id);
        }
    }

    #[tokio::test]
    async fn test_client_replies_bypass_chaos() {
        let cluster = Cluster::start(2, ChaosConfig::lossy(1.0)).await.unwrap();

        cluster.broadcast("n0", 1).await.unwrap();
        assert_eq!(cluster.read("n0").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_unknown_node_has_no_route() {
        let cluster = Cluster::start(1, ChaosConfig::reliable()).await.unwrap();

        let result = cluster.request("n9", Body::new(kind::READ)).await;
        assert!(matches!(result, Err(FloodError::TransportError(_))));
    }

    #[tokio::test]
    async fn test_settle_waits_for_delayed_delivery() {
        let chaos = ChaosConfig {
            max_delay: Duration::from_millis(20),
            ..ChaosConfig::reliable()
        };
        let cluster = Cluster::start(2, chaos).await.unwrap();
        cluster
            .assign(&topology::line(&cluster.node_ids()))
            .await
            .unwrap();

        cluster.broadcast("n0", 5).await.unwrap();
        cluster.settle().await.unwrap();

        assert_eq!(cluster.network().in_flight(), 0);
        assert_eq!(cluster.read("n1").await.unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn test_error_reply_surfaces_as_error() {
        let cluster = Cluster::start(1, ChaosConfig::reliable()).await.unwrap();

        let reply = cluster.request("n0", Body::new(kind::BROADCAST)).await.unwrap();
        assert_eq!(reply.msg_type(), kind::ERROR);

        let err = expect(reply, kind::BROADCAST_OK).unwrap_err();
        assert!(err.to_string().contains("expected broadcast_ok from n0"));
    }
}
