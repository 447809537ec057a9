//! # Coordinator
//!
//! Owns the per-connection bookkeeping and dispatches every inbound
//! [`ClientMessage`] to the registry, the [`CallRouter`] or the
//! [`SignalingRelay`].
//!
//! The coordinator is transport agnostic: the WebSocket server and the
//! in-process loopback used in tests both drive it through
//! [`Coordinator::connect`], [`Coordinator::handle_message`] and
//! [`Coordinator::disconnect`].
//!
//! ## Error surfacing
//!
//! | failure                                   | outcome                          |
//! |-------------------------------------------|----------------------------------|
//! | `initiateCall` to an absent role          | `routingError` to the sender     |
//! | `acceptCall`/`rejectCall`, no gatekeeper  | `routingError` to the sender     |
//! | any message before `register`             | `routingError` to the sender     |
//! | relay or `endCall` to an absent role      | logged and dropped               |
//! | frame that does not parse                 | logged and dropped               |
//!
//! ## Example
//!
//! ```rust
//! use portero_signaling_core::{ClientMessage, Coordinator, CoordinatorConfig, Role, ServerMessage};
//!
//! let coordinator = Coordinator::new(CoordinatorConfig::default());
//! let (department, mut inbox) = coordinator.connect();
//! coordinator
//!     .handle_message(department, ClientMessage::Register { role: Role::from("Soporte") })
//!     .unwrap();
//!
//! let roster = tokio_test::block_on(inbox.recv());
//! assert_eq!(roster, Some(ServerMessage::RosterChanged { roles: vec![Role::from("Soporte")] }));
//! ```

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::error::{SignalingError, SignalingResult};
use crate::outbox::Outbox;
use crate::protocol::{ClientMessage, ConnectionId, Role, ServerMessage};
use crate::registry::DeviceRegistry;
use crate::relay::{RelayedSignal, SignalingRelay};
use crate::routing::CallRouter;

/// Bookkeeping for one live connection
#[derive(Debug, Clone)]
pub struct ConnectionState {
    /// Role claimed by the connection's latest `register`
    pub role: Option<Role>,
    pub connected_at: DateTime<Utc>,
}

/// Central signaling coordinator shared by every connection task
pub struct Coordinator {
    config: CoordinatorConfig,
    registry: Arc<DeviceRegistry>,
    outbox: Arc<Outbox>,
    router: CallRouter,
    relay: SignalingRelay,
    connections: DashMap<ConnectionId, ConnectionState>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let outbox = Arc::new(Outbox::new());
        let router = CallRouter::new(
            registry.clone(),
            outbox.clone(),
            config.gatekeeper_role.clone(),
        );
        let relay = SignalingRelay::new(registry.clone(), outbox.clone());

        Self {
            config,
            registry,
            outbox,
            router,
            relay,
            connections: DashMap::new(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Accept a new connection and hand back its id and outbound queue
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let connection = ConnectionId::new();
        let rx = self.outbox.attach(connection);
        self.connections.insert(
            connection,
            ConnectionState {
                role: None,
                connected_at: Utc::now(),
            },
        );
        info!(connection = %connection, "Endpoint connected");
        (connection, rx)
    }

    /// Forget a connection and unregister its roles
    pub fn disconnect(&self, connection: ConnectionId) {
        let state = self.connections.remove(&connection).map(|(_, state)| state);
        self.outbox.detach(connection);

        let removed = self.registry.unregister(connection);
        if let Some(state) = state {
            let lifetime = Utc::now() - state.connected_at;
            info!(
                connection = %connection,
                role = ?state.role.as_ref().map(Role::as_str),
                seconds = lifetime.num_seconds(),
                "Endpoint disconnected"
            );
        }
        if !removed.is_empty() {
            self.broadcast_roster();
        }
    }

    /// Registered, callable roles
    pub fn roster(&self) -> Vec<Role> {
        self.registry.roster(&self.config.gatekeeper_role)
    }

    /// Parse and dispatch a raw text frame. Frames that do not parse are dropped.
    pub fn handle_text(&self, connection: ConnectionId, text: &str) -> SignalingResult<()> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle_message(connection, message),
            Err(e) => {
                let error = SignalingError::Malformed {
                    reason: e.to_string(),
                };
                warn!(connection = %connection, error = %error, "Dropping frame");
                Err(error)
            }
        }
    }

    /// Dispatch one message from `connection`.
    ///
    /// Errors the sender needs to know about are also delivered to it as a
    /// `routingError`; the returned error is for the caller's logs.
    pub fn handle_message(
        &self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> SignalingResult<()> {
        debug!(connection = %connection, kind = message.kind(), "Inbound message");

        let result = self.dispatch(connection, message);

        if let Err(error) = &result {
            if error.is_surfaced() {
                let notice = ServerMessage::RoutingError {
                    message: error.to_string(),
                };
                if self.outbox.deliver(connection, notice).is_err() {
                    debug!(connection = %connection, "Sender went away before its routing error");
                }
            }
        }
        result
    }

    fn register(&self, connection: ConnectionId, role: Role) -> SignalingResult<()> {
        if role.is_empty() {
            let error = SignalingError::Malformed {
                reason: "register requires a non-empty role".to_string(),
            };
            warn!(connection = %connection, error = %error, "Dropping registration");
            return Err(error);
        }

        if let Some(mut state) = self.connections.get_mut(&connection) {
            state.role = Some(role.clone());
        }
        if let Some(orphaned) = self.registry.register(role, connection) {
            if let Some(mut state) = self.connections.get_mut(&orphaned) {
                state.role = None;
            }
        }
        self.broadcast_roster();
        Ok(())
    }

    fn dispatch(&self, connection: ConnectionId, message: ClientMessage) -> SignalingResult<()> {
        if let ClientMessage::Register { role } = message {
            return self.register(connection, role);
        }
        let from = self
            .role_of(connection)
            .ok_or(SignalingError::NotRegistered)?;

        match message {
            ClientMessage::InitiateCall { target } => {
                self.router.initiate_call(&from, &target).map(drop)
            }
            ClientMessage::AcceptCall => self.router.accept_call(&from).map(drop),
            ClientMessage::RejectCall => self.router.reject_call(&from).map(drop),
            ClientMessage::EndCall { target } => {
                let _ = self.router.end_call(&from, &target);
                Ok(())
            }
            ClientMessage::Offer {
                target,
                description,
            } => self.forward(&from, &target, RelayedSignal::Offer(description)),
            ClientMessage::Answer {
                target,
                description,
            } => self.forward(&from, &target, RelayedSignal::Answer(description)),
            ClientMessage::IceCandidate { target, candidate } => {
                self.forward(&from, &target, RelayedSignal::IceCandidate(candidate))
            }
            ClientMessage::Register { .. } => Ok(()),
        }
    }

    // Relay failures are logged by the relay and not reported to the sender.
    fn forward(&self, from: &Role, target: &Role, signal: RelayedSignal) -> SignalingResult<()> {
        let _ = self.relay.relay(target, from, signal);
        Ok(())
    }

    /// Role `connection` speaks for, if the registry still maps it there
    fn role_of(&self, connection: ConnectionId) -> Option<Role> {
        let role = self
            .connections
            .get(&connection)
            .and_then(|state| state.role.clone())?;
        (self.registry.lookup(role.as_str()) == Some(connection)).then_some(role)
    }

    fn broadcast_roster(&self) {
        let roles = self.roster();
        let reached = self.outbox.broadcast(&ServerMessage::RosterChanged {
            roles: roles.clone(),
        });
        debug!(roles = roles.len(), reached, "Roster broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SessionDescription;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    fn register(coordinator: &Coordinator, role: &str) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let (conn, mut rx) = coordinator.connect();
        coordinator
            .handle_message(conn, ClientMessage::Register { role: Role::from(role) })
            .unwrap();
        drain(&mut rx);
        (conn, rx)
    }

    #[test]
    fn register_broadcasts_roster_to_everyone() {
        let coordinator = Coordinator::new(CoordinatorConfig::default());
        let (_, mut gate_rx) = register(&coordinator, "Portero");

        let (dept, mut dept_rx) = coordinator.connect();
        coordinator
            .handle_message(dept, ClientMessage::Register { role: Role::from("Soporte") })
            .unwrap();

        let expected = ServerMessage::RosterChanged {
            roles: vec![Role::from("Soporte")],
        };
        assert_eq!(drain(&mut gate_rx), vec![expected.clone()]);
        assert_eq!(drain(&mut dept_rx), vec![expected]);
    }

    #[test]
    fn unregistered_sender_gets_routing_error() {
        let coordinator = Coordinator::new(CoordinatorConfig::default());
        let (conn, mut rx) = coordinator.connect();

        let err = coordinator
            .handle_message(conn, ClientMessage::InitiateCall { target: Role::from("Soporte") })
            .unwrap_err();

        assert_eq!(err, SignalingError::NotRegistered);
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::RoutingError {
                message: "connection is not registered".to_string()
            }]
        );
    }

    #[test]
    fn blank_role_is_not_registered() {
        let coordinator = Coordinator::new(CoordinatorConfig::default());
        let (conn, mut rx) = coordinator.connect();

        let err = coordinator
            .handle_message(conn, ClientMessage::Register { role: Role::from("  ") })
            .unwrap_err();

        assert!(matches!(err, SignalingError::Malformed { .. }));
        assert!(coordinator.registry().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn initiate_to_absent_role_reports_only_to_sender() {
        let coordinator = Coordinator::new(CoordinatorConfig::default());
        let (gate, mut gate_rx) = register(&coordinator, "Portero");
        let (_, mut other_rx) = register(&coordinator, "Sistemas");
        drain(&mut gate_rx);

        coordinator
            .handle_message(gate, ClientMessage::InitiateCall { target: Role::from("Soporte") })
            .unwrap_err();

        assert_eq!(
            drain(&mut gate_rx),
            vec![ServerMessage::RoutingError {
                message: "Soporte is not available".to_string()
            }]
        );
        assert!(drain(&mut other_rx).is_empty());
    }

    #[test]
    fn relay_to_absent_role_is_silent() {
        let coordinator = Coordinator::new(CoordinatorConfig::default());
        let (gate, mut gate_rx) = register(&coordinator, "Portero");

        coordinator
            .handle_message(gate, ClientMessage::EndCall { target: Role::from("Soporte") })
            .unwrap();

        assert!(drain(&mut gate_rx).is_empty());
    }

    #[test]
    fn malformed_frame_is_dropped() {
        let coordinator = Coordinator::new(CoordinatorConfig::default());
        let (conn, mut rx) = register(&coordinator, "Portero");

        let err = coordinator.handle_text(conn, "{\"type\":\"dance\"}").unwrap_err();
        assert!(matches!(err, SignalingError::Malformed { .. }));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn disconnect_unregisters_and_rebroadcasts() {
        let coordinator = Coordinator::new(CoordinatorConfig::default());
        let (_, mut gate_rx) = register(&coordinator, "Portero");
        let (dept, _dept_rx) = register(&coordinator, "Soporte");
        drain(&mut gate_rx);

        coordinator.disconnect(dept);

        assert_eq!(coordinator.registry().lookup("Soporte"), None);
        assert_eq!(
            drain(&mut gate_rx),
            vec![ServerMessage::RosterChanged { roles: vec![] }]
        );
    }

    #[test]
    fn connection_that_lost_its_role_cannot_speak_for_it() {
        let coordinator = Coordinator::new(CoordinatorConfig::default());
        let (_, mut gate_rx) = register(&coordinator, "Portero");
        let (stale, mut stale_rx) = register(&coordinator, "Soporte");
        let (current, _current_rx) = register(&coordinator, "Soporte");
        drain(&mut gate_rx);
        drain(&mut stale_rx);

        let err = coordinator
            .handle_message(
                stale,
                ClientMessage::Offer {
                    target: Role::from("Portero"),
                    description: SessionDescription::offer("v=0 stale"),
                },
            )
            .unwrap_err();
        assert_eq!(err, SignalingError::NotRegistered);
        let err = coordinator
            .handle_message(stale, ClientMessage::AcceptCall)
            .unwrap_err();
        assert_eq!(err, SignalingError::NotRegistered);
        assert_eq!(drain(&mut stale_rx).len(), 2);
        assert!(drain(&mut gate_rx).is_empty());

        coordinator
            .handle_message(
                current,
                ClientMessage::Offer {
                    target: Role::from("Portero"),
                    description: SessionDescription::offer("v=0 current"),
                },
            )
            .unwrap();
        assert_eq!(
            drain(&mut gate_rx),
            vec![ServerMessage::Offer {
                from: Role::from("Soporte"),
                description: SessionDescription::offer("v=0 current"),
            }]
        );
    }

    #[test]
    fn disconnect_of_unregistered_connection_is_quiet() {
        let coordinator = Coordinator::new(CoordinatorConfig::default());
        let (_, mut gate_rx) = register(&coordinator, "Portero");
        let (idle, _idle_rx) = coordinator.connect();

        coordinator.disconnect(idle);
        assert!(drain(&mut gate_rx).is_empty());
    }
}
