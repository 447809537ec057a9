//! Error types for endpoint-side call handling
//!
//! Errors are grouped into categories so callers can decide how to react:
//!
//! - **routing** - the coordinator could not reach the other role
//! - **media** - local capture or the peer connection failed
//! - **session** - the operation is not valid for the current call status
//! - **network** - the signaling transport is down; usually recoverable by retrying
//! - **configuration** - invalid settings, not recoverable without fixing them
//!
//! Every error path inside the session driver ends in the same teardown as a
//! local hangup, so an error never leaves a half-initialized call behind.

use thiserror::Error;

use crate::session::CallStatus;

/// Result type alias for client-core operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The coordinator reported that the destination role is not registered
    #[error("Target unavailable: {message}")]
    TargetUnavailable { message: String },

    /// A remote ICE candidate arrived before any remote description was applied
    #[error("No remote description has been applied yet")]
    NoRemoteDescription,

    /// Local capture did not become ready in time, or failed outright
    #[error("Local media unavailable: {reason}")]
    MediaUnavailable { reason: String },

    #[error("Peer connection failed: {state}")]
    PeerConnectionFailed { state: String },

    /// The requested operation is not allowed in the current call status
    #[error("Cannot {operation} while {status}")]
    InvalidTransition {
        operation: &'static str,
        status: CallStatus,
    },

    /// Offer/answer generation or application failed
    #[error("Negotiation failed: {reason}")]
    Negotiation { reason: String },

    #[error("Signaling transport error: {reason}")]
    Transport { reason: String },

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("Operation timed out after {duration_ms}ms")]
    OperationTimeout { duration_ms: u64 },

    /// The session driver has stopped
    #[error("Call session is closed")]
    SessionClosed,
}

impl ClientError {
    pub fn negotiation(reason: impl std::fmt::Display) -> Self {
        Self::Negotiation {
            reason: reason.to_string(),
        }
    }

    pub fn transport(reason: impl std::fmt::Display) -> Self {
        Self::Transport {
            reason: reason.to_string(),
        }
    }

    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::Transport { .. } | ClientError::OperationTimeout { .. } => true,

            ClientError::InvalidConfiguration { .. }
            | ClientError::InvalidTransition { .. }
            | ClientError::Protocol(_)
            | ClientError::SessionClosed => false,

            _ => false,
        }
    }

    /// Short category name for logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::TargetUnavailable { .. } => "routing",

            ClientError::NoRemoteDescription
            | ClientError::MediaUnavailable { .. }
            | ClientError::PeerConnectionFailed { .. }
            | ClientError::Negotiation { .. } => "media",

            ClientError::InvalidTransition { .. } | ClientError::SessionClosed => "session",

            ClientError::Transport { .. } | ClientError::OperationTimeout { .. } => "network",

            ClientError::Protocol(_) => "protocol",

            ClientError::InvalidConfiguration { .. } => "configuration",
        }
    }
}

impl From<webrtc::Error> for ClientError {
    fn from(e: webrtc::Error) -> Self {
        ClientError::negotiation(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_retried() {
        assert!(ClientError::transport("connection refused").is_recoverable());
        assert!(ClientError::OperationTimeout { duration_ms: 10 }.is_recoverable());
        assert!(!ClientError::invalid_configuration("role", "empty").is_recoverable());
        assert!(!ClientError::NoRemoteDescription.is_recoverable());
    }

    #[test]
    fn categories() {
        assert_eq!(ClientError::NoRemoteDescription.category(), "media");
        assert_eq!(
            ClientError::TargetUnavailable { message: "Soporte is not available".into() }.category(),
            "routing"
        );
        assert_eq!(
            ClientError::InvalidTransition { operation: "accept", status: CallStatus::Idle }.category(),
            "session"
        );
    }

    #[test]
    fn invalid_transition_message_names_status() {
        let err = ClientError::InvalidTransition {
            operation: "accept",
            status: CallStatus::Idle,
        };
        assert_eq!(err.to_string(), "Cannot accept while idle");
    }
}
