//! Offer/answer and ICE candidate relay

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{SignalingError, SignalingResult};
use crate::outbox::Outbox;
use crate::protocol::{ConnectionId, IceCandidate, Role, ServerMessage, SessionDescription};
use crate::registry::DeviceRegistry;

/// Kind of relayed negotiation message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// A negotiation payload on its way to another endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayedSignal {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
}

impl RelayedSignal {
    pub fn kind(&self) -> SignalKind {
        match self {
            RelayedSignal::Offer(_) => SignalKind::Offer,
            RelayedSignal::Answer(_) => SignalKind::Answer,
            RelayedSignal::IceCandidate(_) => SignalKind::IceCandidate,
        }
    }

    fn into_message(self, from: Role) -> ServerMessage {
        match self {
            RelayedSignal::Offer(description) => ServerMessage::Offer { from, description },
            RelayedSignal::Answer(description) => ServerMessage::Answer { from, description },
            RelayedSignal::IceCandidate(candidate) => ServerMessage::IceCandidate { from, candidate },
        }
    }
}

/// Store-and-forward relay for offers, answers and candidates.
///
/// Content agnostic: SDP and candidate strings are forwarded untouched, and
/// ordering is whatever the per-connection queue provides (FIFO).
pub struct SignalingRelay {
    registry: Arc<DeviceRegistry>,
    outbox: Arc<Outbox>,
}

impl SignalingRelay {
    pub fn new(registry: Arc<DeviceRegistry>, outbox: Arc<Outbox>) -> Self {
        Self { registry, outbox }
    }

    /// Forward `signal` from `from` to whichever connection holds `target`
    pub fn relay(
        &self,
        target: &Role,
        from: &Role,
        signal: RelayedSignal,
    ) -> SignalingResult<ConnectionId> {
        let kind = signal.kind();
        let Some(connection) = self.registry.lookup(target.as_str()) else {
            warn!(?kind, from = %from, target = %target, "Dropping signal for unregistered role");
            return Err(SignalingError::target_unavailable(target));
        };

        match self.outbox.deliver(connection, signal.into_message(from.clone())) {
            Ok(()) => {
                debug!(?kind, from = %from, target = %target, connection = %connection, "Signal relayed");
                Ok(connection)
            }
            Err(e) => {
                warn!(?kind, from = %from, target = %target, error = %e, "Dropping signal");
                Err(SignalingError::target_unavailable(target))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relays_offer_tagged_with_sender() {
        let registry = Arc::new(DeviceRegistry::new());
        let outbox = Arc::new(Outbox::new());
        let relay = SignalingRelay::new(registry.clone(), outbox.clone());

        let dept = ConnectionId::new();
        let mut rx = outbox.attach(dept);
        registry.register(Role::from("Soporte"), dept);

        relay
            .relay(
                &Role::from("Soporte"),
                &Role::from("Portero"),
                RelayedSignal::Offer(SessionDescription::offer("v=0 opaque")),
            )
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerMessage::Offer {
                from: Role::from("Portero"),
                description: SessionDescription::offer("v=0 opaque"),
            }
        );
    }

    #[test]
    fn preserves_order_per_connection() {
        let registry = Arc::new(DeviceRegistry::new());
        let outbox = Arc::new(Outbox::new());
        let relay = SignalingRelay::new(registry.clone(), outbox.clone());

        let gate = ConnectionId::new();
        let mut rx = outbox.attach(gate);
        registry.register(Role::from("Portero"), gate);

        for i in 0..5 {
            let candidate = IceCandidate {
                candidate: format!("candidate:{}", i),
                sdp_mid: Some("0".to_string()),
                sdp_mline_index: Some(0),
            };
            relay
                .relay(&Role::from("Portero"), &Role::from("Soporte"), RelayedSignal::IceCandidate(candidate))
                .unwrap();
        }

        for i in 0..5 {
            match rx.try_recv().unwrap() {
                ServerMessage::IceCandidate { from, candidate } => {
                    assert_eq!(from, Role::from("Soporte"));
                    assert_eq!(candidate.candidate, format!("candidate:{}", i));
                }
                other => panic!("unexpected message {:?}", other),
            }
        }
    }

    #[test]
    fn unregistered_target_is_dropped() {
        let registry = Arc::new(DeviceRegistry::new());
        let outbox = Arc::new(Outbox::new());
        let relay = SignalingRelay::new(registry, outbox);

        let err = relay
            .relay(
                &Role::from("Soporte"),
                &Role::from("Portero"),
                RelayedSignal::Answer(SessionDescription::answer("v=0")),
            )
            .unwrap_err();
        assert_eq!(err, SignalingError::TargetUnavailable { role: Role::from("Soporte") });
    }
}
