//! In-memory transport that records everything it is asked to send

use std::collections::HashSet;

use parking_lot::Mutex;

use flood_core::{FloodError, FloodResult, NodeId};
use flood_wire::Envelope;

use crate::Transport;

/// Recording transport for tests and simulations
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Envelope>>,
    unreachable: Mutex<HashSet<NodeId>>,
    closed: Mutex<bool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later transmit to `node` fail
    pub fn mark_unreachable(&self, node: NodeId) {
        self.unreachable.lock().insert(node);
    }

    /// Everything transmitted so far
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }

    /// Everything transmitted to `dest`
    pub fn sent_to(&self, dest: &NodeId) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .filter(|e| &e.dest == dest)
            .cloned()
            .collect()
    }

    /// Envelopes of a given type
    pub fn sent_of_type(&self, msg_type: &str) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .filter(|e| e.msg_type() == msg_type)
            .cloned()
            .collect()
    }

    /// Drain the record
    pub fn take(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Transport for MemoryTransport {
    fn transmit(&self, envelope: Envelope) -> FloodResult<()> {
        if *self.closed.lock() {
            return Err(FloodError::TransportClosed);
        }
        if self.unreachable.lock().contains(&envelope.dest) {
            return Err(FloodError::TransportError(format!(
                "{} unreachable",
                envelope.dest
            )));
        }
        self.sent.lock().push(envelope);
        Ok(())
    }

    fn close(&self) {
        *self.closed.lock() = true;
    }
}
