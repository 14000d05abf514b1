//! Flood Wire Protocol - JSON envelope format
//!
//! This crate implements the line-oriented wire format:
//! - Envelope (src, dest, body), one JSON object per line
//! - Body with type tag, message ids and flattened payload fields
//! - Message type constants and typed request decoding
//! - Reply body constructors

pub mod body;
pub mod envelope;
pub mod messages;

pub use body::*;
pub use envelope::*;
pub use messages::*;
