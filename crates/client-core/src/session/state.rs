//! Call status and its transition table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the local endpoint is in a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Idle,
    /// Outgoing call placed, or incoming call accepted and negotiating
    Calling,
    /// Incoming call waiting for accept/reject
    Ringing,
    Connected,
    /// Torn down; resets to idle once cleanup is done
    Ended,
}

impl CallStatus {
    /// Whether a call occupies the endpoint
    pub fn is_active(self) -> bool {
        matches!(self, CallStatus::Calling | CallStatus::Ringing | CallStatus::Connected)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallStatus::Idle => "idle",
            CallStatus::Calling => "calling",
            CallStatus::Ringing => "ringing",
            CallStatus::Connected => "connected",
            CallStatus::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Inputs that move a call between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Initiate,
    Incoming,
    Accept,
    Reject,
    /// The called department declined
    Rejected,
    /// A remote offer or answer was applied
    RemoteDescriptionProcessed,
    PeerConnectionLost,
    Hangup,
    Reset,
}

impl Transition {
    pub fn operation(self) -> &'static str {
        match self {
            Transition::Initiate => "initiate",
            Transition::Incoming => "take an incoming call",
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::Rejected => "handle a rejection",
            Transition::RemoteDescriptionProcessed => "apply a remote description",
            Transition::PeerConnectionLost => "handle a lost peer connection",
            Transition::Hangup => "hang up",
            Transition::Reset => "reset",
        }
    }
}

/// Status after applying `transition` to `current`, or `None` when not allowed
pub fn next_status(current: CallStatus, transition: Transition) -> Option<CallStatus> {
    use CallStatus::*;
    use Transition::*;

    match (current, transition) {
        (Idle, Initiate) => Some(Calling),
        (Idle, Incoming) => Some(Ringing),
        (Ringing, Accept) => Some(Calling),
        (Ringing, Reject) => Some(Idle),
        (Calling, Rejected) => Some(Idle),
        (Calling, RemoteDescriptionProcessed) => Some(Connected),
        (Connected, RemoteDescriptionProcessed) => Some(Connected),
        (Calling | Connected, PeerConnectionLost) => Some(Ended),
        (Calling | Connected | Ringing, Hangup) => Some(Ended),
        (Ended, Reset) => Some(Idle),
        _ => None,
    }
}
