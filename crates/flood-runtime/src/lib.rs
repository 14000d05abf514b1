//! Flood Runtime - Broadcast dissemination node
//!
//! This crate implements the node's request handling:
//! - SeenSet: every value this node has recorded, never shrinks
//! - NeighborTable: fan-out targets, replaced wholesale by `topology`
//! - BroadcastDispatcher: record once, forward once per value
//! - QueryResponder, TopologyHandler, echo and id generation
//! - Node: wires everything onto a gateway
//!
//! Locking: SeenSet and NeighborTable each own an independent lock. When both
//! are held the order is always SeenSet, then NeighborTable.

pub mod seen;
pub mod neighbors;
pub mod broadcast;
pub mod read;
pub mod topology;
pub mod echo;
pub mod generate;
pub mod node;

#[cfg(test)]
mod testing;

pub use seen::*;
pub use neighbors::*;
pub use broadcast::*;
pub use read::*;
pub use topology::*;
pub use echo::*;
pub use generate::*;
pub use node::*;
