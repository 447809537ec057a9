//! Per-connection outbound queues

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{SignalingError, SignalingResult};
use crate::protocol::{ConnectionId, ServerMessage};

/// Table of live connections and the queue that feeds each one's socket.
///
/// Delivery is best effort: a message for a connection whose socket task has
/// gone away is reported as [`SignalingError::ConnectionClosed`] and dropped.
#[derive(Debug, Default)]
pub struct Outbox {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Create the outbound queue for a new connection
    pub fn attach(&self, connection: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(connection, tx);
        debug!(connection = %connection, "Connection attached");
        rx
    }

    /// Drop the outbound queue of a closed connection
    pub fn detach(&self, connection: ConnectionId) {
        if self.connections.remove(&connection).is_some() {
            debug!(connection = %connection, "Connection detached");
        }
    }

    /// Queue `message` for one connection
    pub fn deliver(&self, connection: ConnectionId, message: ServerMessage) -> SignalingResult<()> {
        let sender = self
            .connections
            .get(&connection)
            .map(|entry| entry.value().clone())
            .ok_or(SignalingError::ConnectionClosed { connection })?;

        trace!(connection = %connection, kind = message.kind(), "Queueing message");
        sender
            .send(message)
            .map_err(|_| SignalingError::ConnectionClosed { connection })
    }

    /// Queue `message` for every live connection; returns how many accepted it
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let senders: Vec<_> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        senders
            .into_iter()
            .filter(|sender| sender.send(message.clone()).is_ok())
            .count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
