//! Error types for the flood node

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NodeId;

/// Core flood errors
#[derive(Error, Debug)]
pub enum FloodError {
    // Request errors
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unsupported message type: {0}")]
    NotSupported(String),

    // Lifecycle errors
    #[error("Node not initialized")]
    NotInitialized,

    #[error("Node already initialized as {0}")]
    AlreadyInitialized(NodeId),

    // Wire errors
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    // Transport errors
    #[error("Forward to {dest} failed: {reason}")]
    ForwardFailure { dest: NodeId, reason: String },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Transport closed")]
    TransportClosed,

    // Id errors
    #[error("Id space exhausted")]
    IdSpaceExhausted,

    // Config errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FloodError {
    /// Wire error code reported to the requester when this error ends a handler
    pub fn code(&self) -> ErrorCode {
        match self {
            FloodError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            FloodError::NotSupported(_) => ErrorCode::NotSupported,
            FloodError::NotInitialized => ErrorCode::TemporarilyUnavailable,
            FloodError::AlreadyInitialized(_) => ErrorCode::PreconditionFailed,
            FloodError::MalformedEnvelope(_) => ErrorCode::MalformedRequest,
            FloodError::ForwardFailure { .. }
            | FloodError::TransportError(_)
            | FloodError::TransportClosed
            | FloodError::IdSpaceExhausted
            | FloodError::InvalidConfig(_) => ErrorCode::Crash,
        }
    }
}

/// Error codes carried in `error` replies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    NotSupported,
    TemporarilyUnavailable,
    MalformedRequest,
    PreconditionFailed,
    Crash,
}

/// Result type for flood operations
pub type FloodResult<T> = Result<T, FloodError>;
