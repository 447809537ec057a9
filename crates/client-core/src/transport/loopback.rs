//! In-process transport bound directly to a [`Coordinator`]

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use portero_signaling_core::{ClientMessage, ConnectionId, Coordinator, Role};

use super::{SignalingTransport, TransportEvent};
use crate::error::{ClientError, ClientResult};

/// Transport for endpoints embedded in the coordinator's process.
///
/// Registers `role` on creation and disconnects from the coordinator when
/// dropped.
pub struct LoopbackTransport {
    coordinator: Arc<Coordinator>,
    connection: ConnectionId,
    pump: JoinHandle<()>,
}

impl LoopbackTransport {
    pub fn connect(
        coordinator: Arc<Coordinator>,
        role: Role,
    ) -> ClientResult<(Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>)> {
        let (connection, mut inbound) = coordinator.connect();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let _ = events_tx.send(TransportEvent::Connected);
        coordinator
            .handle_message(connection, ClientMessage::Register { role: role.clone() })
            .map_err(ClientError::transport)?;

        let pump = tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                if events_tx.send(TransportEvent::Message(message)).is_err() {
                    break;
                }
            }
            let _ = events_tx.send(TransportEvent::Disconnected {
                reason: "coordinator closed the connection".to_string(),
            });
        });

        debug!(role = %role, connection = %connection, "Loopback transport connected");
        Ok((
            Arc::new(Self {
                coordinator,
                connection,
                pump,
            }),
            events_rx,
        ))
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }
}

#[async_trait]
impl SignalingTransport for LoopbackTransport {
    async fn send(&self, message: ClientMessage) -> ClientResult<()> {
        // Routing failures are reported back as routingError messages
        let _ = self.coordinator.handle_message(self.connection, message);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.pump.is_finished()
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.coordinator.disconnect(self.connection);
        self.pump.abort();
    }
}
