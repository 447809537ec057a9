//! WebSocket transport to a remote coordinator

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use portero_signaling_core::{ClientMessage, Role, ServerMessage};

use super::{SignalingTransport, TransportEvent};
use crate::error::{ClientError, ClientResult};
use crate::recovery::{retry_with_backoff, with_timeout, RetryConfig};

/// Upper bound for a single connection attempt
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Default)]
struct Shared {
    /// Frames for the live socket; `None` while disconnected
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

/// Reconnecting WebSocket client.
///
/// A background task keeps the socket up with jittered exponential backoff
/// and registers the role on every connection. Messages sent while the
/// socket is down fail instead of being queued.
pub struct WebSocketTransport {
    shared: Arc<Shared>,
    supervisor: JoinHandle<()>,
}

impl WebSocketTransport {
    pub fn connect(
        url: &str,
        role: Role,
        retry: RetryConfig,
    ) -> ClientResult<(Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>)> {
        let url = Url::parse(url).map_err(|e| ClientError::invalid_configuration("server_url", e.to_string()))?;
        let shared = Arc::new(Shared::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let supervisor = tokio::spawn(supervise(url, role, retry, shared.clone(), events_tx));
        Ok((Arc::new(Self { shared, supervisor }), events_rx))
    }
}

#[async_trait]
impl SignalingTransport for WebSocketTransport {
    async fn send(&self, message: ClientMessage) -> ClientResult<()> {
        let text = serde_json::to_string(&message)?;
        let outbound = self.shared.outbound.lock().clone();
        match outbound {
            Some(tx) => tx
                .send(text)
                .map_err(|_| ClientError::transport("connection closed")),
            None => Err(ClientError::transport("not connected to the coordinator")),
        }
    }

    fn is_connected(&self) -> bool {
        self.shared.outbound.lock().is_some()
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

async fn supervise(
    url: Url,
    role: Role,
    retry: RetryConfig,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    loop {
        let connected = retry_with_backoff("signaling_connect", retry.clone(), || {
            let url = url.clone();
            with_timeout("signaling_connect", CONNECT_TIMEOUT, async move {
                connect_async(url.as_str())
                    .await
                    .map(|(socket, _response)| socket)
                    .map_err(ClientError::transport)
            })
        })
        .await;

        let socket = match connected {
            Ok(socket) => socket,
            Err(e) => {
                warn!(url = %url, error = %e, "Giving up on the coordinator");
                let _ = events.send(TransportEvent::Disconnected {
                    reason: e.to_string(),
                });
                return;
            }
        };

        info!(url = %url, role = %role, "Connected to coordinator");
        let reason = pump(socket, &role, &shared, &events).await;
        *shared.outbound.lock() = None;

        warn!(url = %url, reason = %reason, "Coordinator connection lost");
        if events.send(TransportEvent::Disconnected { reason }).is_err() {
            return;
        }
        tokio::time::sleep(retry.initial_delay).await;
    }
}

/// Serve one socket until it closes; returns why it closed
async fn pump(
    socket: Socket,
    role: &Role,
    shared: &Shared,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> String {
    let (mut write, mut read) = socket.split();

    let register = match serde_json::to_string(&ClientMessage::Register { role: role.clone() }) {
        Ok(text) => text,
        Err(e) => return format!("failed to encode registration: {}", e),
    };
    if let Err(e) = write.send(Message::text(register)).await {
        return format!("registration failed: {}", e);
    }

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    *shared.outbound.lock() = Some(out_tx);
    if events.send(TransportEvent::Connected).is_err() {
        return "session dropped".to_string();
    }

    loop {
        tokio::select! {
            Some(text) = out_rx.recv() => {
                if let Err(e) = write.send(Message::text(text)).await {
                    return format!("send failed: {}", e);
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMessage>(text.as_str()) {
                            Ok(message) => {
                                if events.send(TransportEvent::Message(message)).is_err() {
                                    return "session dropped".to_string();
                                }
                            }
                            Err(e) => warn!("Ignoring malformed frame from coordinator: {}", e),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => return "closed by coordinator".to_string(),
                    Some(Err(e)) => return format!("websocket error: {}", e),
                    Some(Ok(_)) => debug!("Ignoring non-text frame"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unparseable_url() {
        let result = WebSocketTransport::connect("not a url", Role::from("Soporte"), RetryConfig::default());
        assert!(matches!(result, Err(ClientError::InvalidConfiguration { .. })));
    }

    #[tokio::test]
    async fn send_fails_while_disconnected() {
        let retry = RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(10),
            ..RetryConfig::default()
        };
        // Nothing listens on port 9 of the loopback interface
        let (transport, mut events) =
            WebSocketTransport::connect("ws://127.0.0.1:9/ws", Role::from("Soporte"), retry).unwrap();

        let err = transport
            .send(ClientMessage::AcceptCall)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
        assert!(!transport.is_connected());

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap();
        assert!(matches!(event, Some(TransportEvent::Disconnected { .. })));
    }
}
