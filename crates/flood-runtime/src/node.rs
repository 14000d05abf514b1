//! Flood Node - wires the handlers onto a gateway

use std::sync::Arc;

use flood_core::{FloodError, FloodResult};
use flood_transport::{Gateway, Transport};
use flood_wire::kind;

use crate::{
    BroadcastCounters, BroadcastDispatcher, EchoResponder, GenerateResponder, NeighborTable,
    NodeState, QueryResponder, SeenSet, TopologyHandler,
};

/// Node configuration
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Do not forward a peer-relayed value straight back to that peer
    pub suppress_sender_echo: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            suppress_sender_echo: true,
        }
    }
}

impl NodeConfig {
    pub const SUPPRESS_SENDER_ECHO_VAR: &'static str = "FLOOD_SUPPRESS_SENDER_ECHO";

    /// Defaults overridden by environment variables
    pub fn from_env() -> FloodResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FloodResult<Self> {
        let mut config = NodeConfig::default();
        if let Some(raw) = lookup(Self::SUPPRESS_SENDER_ECHO_VAR) {
            config.suppress_sender_echo = parse_flag(Self::SUPPRESS_SENDER_ECHO_VAR, &raw)?;
        }
        Ok(config)
    }
}

fn parse_flag(key: &str, raw: &str) -> FloodResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(FloodError::InvalidConfig(format!(
            "{} must be a boolean, got {:?}",
            key, other
        ))),
    }
}

/// Flood node - owns its dedup set and neighbor table exclusively
pub struct Node<T: Transport> {
    config: NodeConfig,
    seen: Arc<SeenSet>,
    neighbors: Arc<NeighborTable>,
    broadcast: BroadcastDispatcher<T>,
    read: QueryResponder<T>,
    topology: TopologyHandler<T>,
    echo: EchoResponder<T>,
    generate: GenerateResponder<T>,
}

impl<T: Transport> Node<T> {
    /// Build a node and register its handlers and init hook on `gateway`
    pub fn attach(gateway: &mut Gateway<T>, config: NodeConfig) -> Arc<Self> {
        let node = Arc::new(Self::new(gateway, config));

        let n = node.clone();
        gateway.handle(kind::ECHO, move |req| n.echo.handle(req));
        let n = node.clone();
        gateway.handle(kind::GENERATE, move |req| n.generate.handle(req));
        let n = node.clone();
        gateway.handle(kind::BROADCAST, move |req| n.broadcast.handle(req));
        let n = node.clone();
        gateway.handle(kind::READ, move |req| n.read.handle(req));
        let n = node.clone();
        gateway.handle(kind::TOPOLOGY, move |req| n.topology.handle(req));

        let n = node.clone();
        gateway.on_init(move |membership| n.generate.seed(membership));

        node
    }

    fn new(gateway: &Gateway<T>, config: NodeConfig) -> Self {
        let outbox = gateway.outbox();
        let seen = Arc::new(SeenSet::new());
        let neighbors = Arc::new(NeighborTable::new());

        Node {
            broadcast: BroadcastDispatcher::new(
                seen.clone(),
                neighbors.clone(),
                outbox.clone(),
                gateway.tasks(),
                config.suppress_sender_echo,
            ),
            read: QueryResponder::new(seen.clone(), outbox.clone()),
            topology: TopologyHandler::new(neighbors.clone(), outbox.clone()),
            echo: EchoResponder::new(outbox.clone()),
            generate: GenerateResponder::new(outbox),
            config,
            seen,
            neighbors,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn state(&self) -> NodeState {
        self.topology.state()
    }

    pub fn counters(&self) -> BroadcastCounters {
        self.broadcast.counters()
    }
}
