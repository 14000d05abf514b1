//! Outbox - addressing and message ids for everything a node emits

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use flood_core::{FloodError, FloodResult, Membership, NodeId, Origin};
use flood_wire::{Body, Envelope};

use crate::Transport;

/// Stamps source, message ids and reply links onto outgoing bodies
pub struct Outbox<T: Transport> {
    transport: Arc<T>,
    /// Set once by `init`
    membership: RwLock<Option<Membership>>,
    next_msg_id: AtomicU64,
}

impl<T: Transport> Outbox<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Outbox {
            transport,
            membership: RwLock::new(None),
            next_msg_id: AtomicU64::new(0),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Install the cluster view. Only the first call succeeds.
    pub fn initialize(&self, membership: Membership) -> FloodResult<()> {
        let mut current = self.membership.write();
        if let Some(existing) = current.as_ref() {
            return Err(FloodError::AlreadyInitialized(existing.node_id().clone()));
        }
        *current = Some(membership);
        Ok(())
    }

    pub fn membership(&self) -> Option<Membership> {
        self.membership.read().clone()
    }

    /// This node's identifier, once initialized
    pub fn node_id(&self) -> FloodResult<NodeId> {
        self.membership
            .read()
            .as_ref()
            .map(|m| m.node_id().clone())
            .ok_or(FloodError::NotInitialized)
    }

    /// Classify a sender. Falls back to the naming convention before `init`.
    pub fn origin_of(&self, sender: &NodeId) -> Origin {
        match self.membership.read().as_ref() {
            Some(membership) => membership.origin_of(sender),
            None => Origin::from_prefix(sender),
        }
    }

    fn next_msg_id(&self) -> u64 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Send a new message to `dest`
    pub fn send(&self, dest: &NodeId, mut body: Body) -> FloodResult<()> {
        let src = self.node_id()?;
        body.msg_id = Some(self.next_msg_id());
        body.in_reply_to = None;
        self.transport.transmit(Envelope::new(src, dest.clone(), body))
    }

    /// Answer `request`
    pub fn reply(&self, request: &Envelope, mut body: Body) -> FloodResult<()> {
        body.msg_id = Some(self.next_msg_id());
        body.in_reply_to = request.body.msg_id;
        self.transport.transmit(Envelope::new(
            request.dest.clone(),
            request.src.clone(),
            body,
        ))
    }
}
