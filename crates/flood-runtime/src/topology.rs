//! `topology` - replace this node's neighbor list

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use flood_core::FloodResult;
use flood_transport::{Outbox, Request, Transport};
use flood_wire::{Body, TopologyRequest};

use crate::NeighborTable;

/// Node lifecycle with respect to topology assignment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// No topology received yet; values are recorded but not forwarded
    Uninitialized,
    /// At least one topology has been applied
    Ready,
}

pub struct TopologyHandler<T: Transport> {
    neighbors: Arc<NeighborTable>,
    outbox: Arc<Outbox<T>>,
    assigned: AtomicBool,
}

impl<T: Transport> TopologyHandler<T> {
    pub fn new(neighbors: Arc<NeighborTable>, outbox: Arc<Outbox<T>>) -> Self {
        TopologyHandler {
            neighbors,
            outbox,
            assigned: AtomicBool::new(false),
        }
    }

    /// Install this node's entry of the mapping. A missing entry means no neighbors.
    pub fn handle(&self, request: &Request) -> FloodResult<()> {
        let mut topology = TopologyRequest::from_body(request.body())?;
        let node_id = self.outbox.node_id()?;
        let neighbors = topology.neighbors_of(&node_id);

        info!(node = %node_id, ?neighbors, "topology assigned");
        self.neighbors.replace(neighbors);
        self.assigned.store(true, Ordering::Release);

        self.outbox.reply(&request.envelope, Body::topology_ok())
    }

    pub fn state(&self) -> NodeState {
        if self.assigned.load(Ordering::Acquire) {
            NodeState::Ready
        } else {
            NodeState::Uninitialized
        }
    }
}
