//! Error types for the signaling coordinator

use crate::protocol::{ConnectionId, Role};
use thiserror::Error;

/// Result type for coordinator operations
pub type SignalingResult<T> = Result<T, SignalingError>;

/// Errors raised while routing or relaying a single message.
///
/// None of these are fatal to the coordinator; they are either surfaced to
/// the sending endpoint as a `routingError` or logged and dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalingError {
    /// No live connection is registered under the destination role
    #[error("{role} is not available")]
    TargetUnavailable { role: Role },

    /// The sending connection has not registered a role yet
    #[error("connection is not registered")]
    NotRegistered,

    /// The frame could not be understood
    #[error("malformed message: {reason}")]
    Malformed { reason: String },

    /// The destination connection's outbound queue is gone
    #[error("connection {connection} is closed")]
    ConnectionClosed { connection: ConnectionId },
}

impl SignalingError {
    /// Create a target-unavailable error
    pub fn target_unavailable(role: &Role) -> Self {
        Self::TargetUnavailable { role: role.clone() }
    }

    /// Whether the error should be reported back to the sender as a `routingError`
    pub fn is_surfaced(&self) -> bool {
        matches!(self, Self::TargetUnavailable { .. } | Self::NotRegistered)
    }
}
