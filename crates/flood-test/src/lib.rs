//! Flood Test Harness - multi-node simulation
//!
//! This crate provides:
//! - Network chaos (loss, duplication, delay/reordering) for peer links
//! - Topology builders (line, ring, grid, star)
//! - An in-memory cluster of real flood nodes driven through their gateways
//! - End-to-end convergence scenarios

pub mod chaos;
pub mod topology;
pub mod cluster;
pub mod convergence;

pub use chaos::*;
pub use topology::*;
pub use cluster::*;
pub use convergence::*;
