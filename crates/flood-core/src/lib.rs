//! Flood Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every flood node crate:
//! - Identifiers (NodeId) and cluster membership
//! - Sender origin classification (client vs. peer)
//! - The broadcast value type
//! - Error taxonomy and wire error codes
//! - Cluster-unique id generation

pub mod id;
pub mod value;
pub mod ids;
pub mod error;

pub use id::*;
pub use value::*;
pub use ids::*;
pub use error::*;
