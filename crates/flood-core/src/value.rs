//! Broadcast payload

/// An integer broadcast payload. Identity is by equality only.
pub type Value = i64;
