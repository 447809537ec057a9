//! Event handling for endpoint applications
//!
//! The call session reports everything the surrounding application needs
//! (the incoming-call prompt, status changes, remote tracks, human-readable
//! status lines) through one [`ClientEventHandler`].
//!
//! # Usage Examples
//!
//! ## Auto-answering department
//!
//! ```rust
//! use portero_client_core::events::{CallAction, CallEndedInfo, ClientEventHandler, IncomingCallInfo};
//! use async_trait::async_trait;
//!
//! struct Kiosk;
//!
//! #[async_trait]
//! impl ClientEventHandler for Kiosk {
//!     async fn on_incoming_call(&self, call: IncomingCallInfo) -> CallAction {
//!         println!("Incoming call from {}", call.caller);
//!         CallAction::Accept
//!     }
//!
//!     async fn on_call_ended(&self, info: CallEndedInfo) {
//!         println!("Call ended: {}", info.reason);
//!     }
//! }
//! ```
//!
//! ## Deferring to a prompt
//!
//! Return [`CallAction::Defer`] and later call
//! [`CallSessionHandle::accept`](crate::session::CallSessionHandle::accept) or
//! [`reject`](crate::session::CallSessionHandle::reject) once the user has
//! decided.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portero_signaling_core::Role;

use crate::error::ClientError;
use crate::media::RemoteTrack;
use crate::session::CallStatus;

/// Decision for an incoming call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    /// Accept right away
    Accept,
    /// Reject right away
    Reject,
    /// Leave the call ringing until the application decides
    Defer,
}

#[derive(Debug, Clone)]
pub struct IncomingCallInfo {
    pub caller: Role,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CallStatusInfo {
    pub peer_role: Option<Role>,
    pub previous: CallStatus,
    pub status: CallStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CallEndedInfo {
    pub peer_role: Option<Role>,
    pub reason: String,
    /// True when the other side (or the network) ended the call
    pub remote: bool,
    pub timestamp: DateTime<Utc>,
}

/// Callbacks from the call session.
///
/// Every method has a default body, so implementors only override what they
/// show. Callbacks run on the session driver; long work should be spawned.
#[async_trait]
pub trait ClientEventHandler: Send + Sync {
    /// A call is ringing. The default leaves it ringing.
    async fn on_incoming_call(&self, _call: IncomingCallInfo) -> CallAction {
        CallAction::Defer
    }

    async fn on_call_state_changed(&self, _info: CallStatusInfo) {}

    /// The called department declined
    async fn on_call_rejected(&self, _responder: Role) {}

    async fn on_call_ended(&self, _info: CallEndedInfo) {}

    /// The remote peer started sending a track
    async fn on_remote_track(&self, _track: RemoteTrack) {}

    /// Callable departments changed
    async fn on_roster_changed(&self, _roles: Vec<Role>) {}

    /// Human-readable progress line for a status/log panel
    async fn on_status(&self, _line: String) {}

    async fn on_error(&self, _error: &ClientError) {}

    /// Signaling connection went up or down
    async fn on_network_event(&self, _connected: bool, _reason: Option<String>) {}
}

/// Handler that ignores everything and leaves incoming calls ringing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventHandler;

#[async_trait]
impl ClientEventHandler for NoopEventHandler {}
