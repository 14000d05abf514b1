//! Flood Transport - RPC gateway
//!
//! This crate provides:
//! - The `Transport` seam and its stdio / in-memory implementations
//! - `Outbox`: addressing, message ids and replies
//! - `Gateway`: handler registry, `init` handshake and concurrent dispatch
//! - `TaskGroup`: detached tasks that can still be drained at shutdown

pub mod transport;
pub mod stdio;
pub mod memory;
pub mod outbox;
pub mod tasks;
pub mod gateway;

pub use transport::*;
pub use stdio::*;
pub use memory::*;
pub use outbox::*;
pub use tasks::*;
pub use gateway::*;
