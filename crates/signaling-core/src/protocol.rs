//! Wire protocol shared by the coordinator and the endpoints
//!
//! Every frame is a single JSON object tagged by `"type"`. Endpoints send
//! [`ClientMessage`]s; the coordinator sends [`ServerMessage`]s.
//!
//! ```rust
//! use portero_signaling_core::protocol::{ClientMessage, Role};
//!
//! let frame = serde_json::to_string(&ClientMessage::InitiateCall {
//!     target: Role::from("Soporte"),
//! }).unwrap();
//! assert_eq!(frame, r#"{"type":"initiateCall","target":"Soporte"}"#);
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Logical endpoint identity, e.g. `"Portero"` or a department name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Role {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque handle for one live endpoint connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SDP message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SdpType::Offer => "offer",
            SdpType::Answer => "answer",
            SdpType::Pranswer => "pranswer",
            SdpType::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

/// Session description exchanged during offer/answer.
///
/// The coordinator never inspects the SDP body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u16>,
}

/// Endpoint → coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Claim a role for this connection
    Register { role: Role },
    /// Ring `target`
    InitiateCall { target: Role },
    /// Accept the ringing call; routed to the gatekeeper
    AcceptCall,
    /// Reject the ringing call; routed to the gatekeeper
    RejectCall,
    Offer {
        target: Role,
        description: SessionDescription,
    },
    Answer {
        target: Role,
        description: SessionDescription,
    },
    IceCandidate { target: Role, candidate: IceCandidate },
    EndCall { target: Role },
}

impl ClientMessage {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Register { .. } => "register",
            ClientMessage::InitiateCall { .. } => "initiateCall",
            ClientMessage::AcceptCall => "acceptCall",
            ClientMessage::RejectCall => "rejectCall",
            ClientMessage::Offer { .. } => "offer",
            ClientMessage::Answer { .. } => "answer",
            ClientMessage::IceCandidate { .. } => "iceCandidate",
            ClientMessage::EndCall { .. } => "endCall",
        }
    }
}

/// Coordinator → endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Registered, callable (non-gatekeeper) roles
    RosterChanged { roles: Vec<Role> },
    IncomingCall { caller: Role },
    CallAccepted { responder: Role },
    CallRejected { responder: Role },
    Offer {
        from: Role,
        description: SessionDescription,
    },
    Answer {
        from: Role,
        description: SessionDescription,
    },
    IceCandidate { from: Role, candidate: IceCandidate },
    EndCall { from: Role },
    RoutingError { message: String },
}

impl ServerMessage {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::RosterChanged { .. } => "rosterChanged",
            ServerMessage::IncomingCall { .. } => "incomingCall",
            ServerMessage::CallAccepted { .. } => "callAccepted",
            ServerMessage::CallRejected { .. } => "callRejected",
            ServerMessage::Offer { .. } => "offer",
            ServerMessage::Answer { .. } => "answer",
            ServerMessage::IceCandidate { .. } => "iceCandidate",
            ServerMessage::EndCall { .. } => "endCall",
            ServerMessage::RoutingError { .. } => "routingError",
        }
    }
}
