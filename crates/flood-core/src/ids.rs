//! Cluster-unique id generation
//!
//! Ids are 64-bit: the node's index in the cluster occupies the high 32 bits
//! and a node-local counter the low 32 bits. Two nodes never share an index,
//! so no coordination is needed.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{FloodError, FloodResult};

/// Largest counter value that still fits in the low half
const COUNTER_MAX: u64 = u32::MAX as u64;

/// Node-local generator of cluster-unique ids
#[derive(Debug)]
pub struct IdGenerator {
    node_index: u32,
    counter: AtomicU64,
}

impl IdGenerator {
    pub fn new(node_index: u32) -> Self {
        IdGenerator {
            node_index,
            counter: AtomicU64::new(0),
        }
    }

    pub fn node_index(&self) -> u32 {
        self.node_index
    }

    /// Next id. Fails once the low half would wrap into a previous id.
    pub fn next(&self) -> FloodResult<u64> {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        if count > COUNTER_MAX {
            return Err(FloodError::IdSpaceExhausted);
        }
        Ok(((self.node_index as u64) << 32) | count)
    }

    #[cfg(test)]
    fn with_counter(node_index: u32, counter: u64) -> Self {
        IdGenerator {
            node_index,
            counter: AtomicU64::new(counter),
        }
    }
}
