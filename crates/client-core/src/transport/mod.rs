//! Signaling transports between an endpoint and the coordinator
//!
//! A transport sends [`ClientMessage`]s and reports everything inbound as a
//! stream of [`TransportEvent`]s. Registration of the endpoint's role is the
//! transport's job: it is re-sent after every (re)connection, so the session
//! never has to care about reconnects.

pub mod loopback;
pub mod websocket;

use async_trait::async_trait;

use portero_signaling_core::{ClientMessage, ServerMessage};

use crate::error::ClientResult;

pub use loopback::LoopbackTransport;
pub use websocket::WebSocketTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connected and registered
    Connected,
    Message(ServerMessage),
    Disconnected { reason: String },
}

#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Send one message; fails with `Transport` while disconnected
    async fn send(&self, message: ClientMessage) -> ClientResult<()>;

    fn is_connected(&self) -> bool;
}
