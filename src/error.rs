//! Error types for actorwire.

use thiserror::Error;

/// Main error type for all actorwire operations.
#[derive(Debug, Error)]
pub enum ActorwireError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Framing violation (oversize or malformed length prefix).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Call into an actor whose context has stopped, or a work item
    /// still queued when the stop occurred.
    #[error("Actor context stopped")]
    ActorStopped,

    /// Failure reported by actor logic.
    #[error("Actor failure: {0}")]
    Actor(String),

    /// Send on a connection that is closing or closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - send queue full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,
}

/// Result type alias using ActorwireError.
pub type Result<T> = std::result::Result<T, ActorwireError>;
