//! # Call Routing
//!
//! Forwards call-control events between the gatekeeper and the departments.
//!
//! ```text
//!   gatekeeper ── initiateCall(target) ──► CallRouter ──► incomingCall(caller) ──► target
//!   department ── acceptCall / rejectCall ─► CallRouter ──► callAccepted / callRejected ──► gatekeeper
//!   any side   ── endCall(target) ─────────► CallRouter ──► endCall(from) ──► target
//! ```
//!
//! Accept and reject carry no destination: they always go to whichever
//! connection currently holds the gatekeeper role. When the gatekeeper is not
//! registered the router reports [`SignalingError::TargetUnavailable`] so the
//! department learns its answer went nowhere.
//!
//! `endCall` to a role that is no longer registered also yields
//! `TargetUnavailable`, but the coordinator only logs it: the peer is gone
//! and its call is over anyway.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{SignalingError, SignalingResult};
use crate::outbox::Outbox;
use crate::protocol::{ConnectionId, Role, ServerMessage};
use crate::registry::DeviceRegistry;

/// Routes initiate/accept/reject/end events to the right connection
pub struct CallRouter {
    registry: Arc<DeviceRegistry>,
    outbox: Arc<Outbox>,
    gatekeeper: Role,
}

impl CallRouter {
    pub fn new(registry: Arc<DeviceRegistry>, outbox: Arc<Outbox>, gatekeeper: Role) -> Self {
        Self {
            registry,
            outbox,
            gatekeeper,
        }
    }

    /// Role that receives accept/reject answers
    pub fn gatekeeper(&self) -> &Role {
        &self.gatekeeper
    }

    /// Ring `target` on behalf of `from`
    pub fn initiate_call(&self, from: &Role, target: &Role) -> SignalingResult<ConnectionId> {
        let delivered = self.route(target, ServerMessage::IncomingCall { caller: from.clone() });
        match &delivered {
            Ok(connection) => {
                info!(from = %from, target = %target, connection = %connection, "Call initiated")
            }
            Err(e) => warn!(from = %from, target = %target, error = %e, "Call initiation failed"),
        }
        delivered
    }

    /// Tell the gatekeeper that `by` accepted
    pub fn accept_call(&self, by: &Role) -> SignalingResult<ConnectionId> {
        let delivered = self.route(
            &self.gatekeeper,
            ServerMessage::CallAccepted { responder: by.clone() },
        );
        match &delivered {
            Ok(_) => info!(by = %by, "Call accepted"),
            Err(e) => warn!(by = %by, error = %e, "Dropping call acceptance"),
        }
        delivered
    }

    /// Tell the gatekeeper that `by` rejected
    pub fn reject_call(&self, by: &Role) -> SignalingResult<ConnectionId> {
        let delivered = self.route(
            &self.gatekeeper,
            ServerMessage::CallRejected { responder: by.clone() },
        );
        match &delivered {
            Ok(_) => info!(by = %by, "Call rejected"),
            Err(e) => warn!(by = %by, error = %e, "Dropping call rejection"),
        }
        delivered
    }

    /// Tell `target` that `from` hung up
    pub fn end_call(&self, from: &Role, target: &Role) -> SignalingResult<ConnectionId> {
        let delivered = self.route(target, ServerMessage::EndCall { from: from.clone() });
        match &delivered {
            Ok(_) => info!(from = %from, target = %target, "Call ended"),
            Err(e) => warn!(from = %from, target = %target, error = %e, "Dropping end of call"),
        }
        delivered
    }

    fn route(&self, target: &Role, message: ServerMessage) -> SignalingResult<ConnectionId> {
        let connection = self
            .registry
            .lookup(target.as_str())
            .ok_or_else(|| SignalingError::target_unavailable(target))?;

        self.outbox
            .deliver(connection, message)
            .map_err(|_| SignalingError::target_unavailable(target))?;
        Ok(connection)
    }
}
