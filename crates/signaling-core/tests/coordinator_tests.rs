//! Routing behaviour of the coordinator, driven without a network.

use portero_signaling_core::{
    ClientMessage, ConnectionId, Coordinator, CoordinatorConfig, IceCandidate, Role,
    ServerMessage, SessionDescription, SignalingError,
};
use tokio::sync::mpsc::UnboundedReceiver;

struct Endpoint {
    connection: ConnectionId,
    inbox: UnboundedReceiver<ServerMessage>,
}

impl Endpoint {
    fn join(coordinator: &Coordinator, role: &str) -> Self {
        let (connection, inbox) = coordinator.connect();
        coordinator
            .handle_message(connection, ClientMessage::Register { role: Role::from(role) })
            .expect("registration");
        let mut endpoint = Self { connection, inbox };
        endpoint.drain();
        endpoint
    }

    fn send(&self, coordinator: &Coordinator, message: ClientMessage) -> Result<(), SignalingError> {
        coordinator.handle_message(self.connection, message)
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = self.inbox.try_recv() {
            out.push(message);
        }
        out
    }
}

fn coordinator() -> Coordinator {
    Coordinator::new(CoordinatorConfig::default())
}

#[test]
fn latest_registration_owns_the_role() {
    let coordinator = coordinator();
    let mut gate = Endpoint::join(&coordinator, "Portero");
    let mut stale = Endpoint::join(&coordinator, "Soporte");
    let mut fresh = Endpoint::join(&coordinator, "Soporte");
    gate.drain();
    stale.drain();

    assert_eq!(coordinator.registry().lookup("Soporte"), Some(fresh.connection));

    gate.send(&coordinator, ClientMessage::InitiateCall { target: Role::from("Soporte") })
        .unwrap();

    assert_eq!(
        fresh.drain(),
        vec![ServerMessage::IncomingCall { caller: Role::from("Portero") }]
    );
    assert!(stale.drain().is_empty());
}

#[test]
fn initiate_to_unregistered_role_fails_once_and_rings_nobody() {
    let coordinator = coordinator();
    let mut gate = Endpoint::join(&coordinator, "Portero");
    let mut other = Endpoint::join(&coordinator, "Sistemas");
    gate.drain();

    let err = gate
        .send(&coordinator, ClientMessage::InitiateCall { target: Role::from("Soporte") })
        .unwrap_err();
    assert_eq!(err, SignalingError::TargetUnavailable { role: Role::from("Soporte") });

    let gate_inbox = gate.drain();
    assert_eq!(gate_inbox.len(), 1);
    assert!(matches!(gate_inbox[0], ServerMessage::RoutingError { .. }));
    assert!(other
        .drain()
        .iter()
        .all(|m| !matches!(m, ServerMessage::IncomingCall { .. })));
}

#[test]
fn disconnect_drops_role_from_next_roster() {
    let coordinator = coordinator();
    let mut gate = Endpoint::join(&coordinator, "Portero");
    let _soporte = Endpoint::join(&coordinator, "Soporte");
    let sistemas = Endpoint::join(&coordinator, "Sistemas");
    gate.drain();

    coordinator.disconnect(sistemas.connection);

    assert_eq!(coordinator.registry().lookup("Sistemas"), None);
    assert_eq!(
        gate.drain(),
        vec![ServerMessage::RosterChanged { roles: vec![Role::from("Soporte")] }]
    );
}

#[test]
fn full_call_exchange_is_relayed_in_order() {
    let coordinator = coordinator();
    let mut gate = Endpoint::join(&coordinator, "Portero");
    let mut dept = Endpoint::join(&coordinator, "Soporte");
    gate.drain();

    gate.send(&coordinator, ClientMessage::InitiateCall { target: Role::from("Soporte") })
        .unwrap();
    assert_eq!(
        dept.drain(),
        vec![ServerMessage::IncomingCall { caller: Role::from("Portero") }]
    );

    dept.send(&coordinator, ClientMessage::AcceptCall).unwrap();
    assert_eq!(
        gate.drain(),
        vec![ServerMessage::CallAccepted { responder: Role::from("Soporte") }]
    );

    gate.send(
        &coordinator,
        ClientMessage::Offer {
            target: Role::from("Soporte"),
            description: SessionDescription::offer("v=0 offer"),
        },
    )
    .unwrap();
    gate.send(
        &coordinator,
        ClientMessage::IceCandidate {
            target: Role::from("Soporte"),
            candidate: IceCandidate {
                candidate: "candidate:1 1 udp 2130706431 10.0.0.2 50000 typ host".to_string(),
                sdp_mid: Some("0".to_string()),
                sdp_mline_index: Some(0),
            },
        },
    )
    .unwrap();

    let received = dept.drain();
    assert_eq!(received.len(), 2);
    assert!(matches!(&received[0], ServerMessage::Offer { from, .. } if from.as_str() == "Portero"));
    assert!(matches!(&received[1], ServerMessage::IceCandidate { from, .. } if from.as_str() == "Portero"));

    dept.send(
        &coordinator,
        ClientMessage::Answer {
            target: Role::from("Portero"),
            description: SessionDescription::answer("v=0 answer"),
        },
    )
    .unwrap();
    assert_eq!(
        gate.drain(),
        vec![ServerMessage::Answer {
            from: Role::from("Soporte"),
            description: SessionDescription::answer("v=0 answer"),
        }]
    );

    dept.send(&coordinator, ClientMessage::EndCall { target: Role::from("Portero") })
        .unwrap();
    assert_eq!(
        gate.drain(),
        vec![ServerMessage::EndCall { from: Role::from("Soporte") }]
    );
}

#[test]
fn answer_without_gatekeeper_is_surfaced_to_department() {
    let coordinator = coordinator();
    let mut dept = Endpoint::join(&coordinator, "Soporte");

    let err = dept.send(&coordinator, ClientMessage::RejectCall).unwrap_err();
    assert_eq!(err, SignalingError::TargetUnavailable { role: Role::from("Portero") });
    assert_eq!(
        dept.drain(),
        vec![ServerMessage::RoutingError {
            message: "Portero is not available".to_string()
        }]
    );
}

#[test]
fn custom_gatekeeper_role_is_respected() {
    let coordinator = Coordinator::new(CoordinatorConfig::default().with_gatekeeper_role("Recepcion"));
    let mut gate = Endpoint::join(&coordinator, "Recepcion");
    let dept = Endpoint::join(&coordinator, "Soporte");
    gate.drain();

    assert_eq!(coordinator.roster(), vec![Role::from("Soporte")]);
    dept.send(&coordinator, ClientMessage::AcceptCall).unwrap();
    assert_eq!(
        gate.drain(),
        vec![ServerMessage::CallAccepted { responder: Role::from("Soporte") }]
    );
}
