//! HTTP + WebSocket front end for the [`Coordinator`].
//!
//! - `GET /` answers with a plain liveness line
//! - `GET <ws_path>` upgrades to the JSON signaling channel, one task per socket

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::coordinator::Coordinator;

/// Body of the liveness endpoint
pub const LIVENESS_TEXT: &str = "Portero signaling coordinator running";

/// Build the axum router for a shared coordinator
pub fn router(coordinator: Arc<Coordinator>) -> Router {
    let ws_path = coordinator.config().ws_path.clone();
    Router::new()
        .route("/", get(liveness))
        .route(&ws_path, get(ws_upgrade))
        .with_state(coordinator)
}

/// Bind `config.bind_addr` and serve until Ctrl-C
pub async fn serve(config: CoordinatorConfig) -> Result<()> {
    let bind = config.bind_addr;
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;

    serve_with_listener(listener, Arc::new(Coordinator::new(config)), shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_with_listener<F>(
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local: SocketAddr = listener.local_addr().context("Listener has no local address")?;
    info!(
        "Signaling coordinator listening on ws://{}{}",
        local,
        coordinator.config().ws_path
    );

    axum::serve(listener, router(coordinator))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Signaling server error")?;

    info!("Signaling coordinator stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
    }
}

async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(coordinator): State<Arc<Coordinator>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, coordinator))
}

/// Pump one socket: inbound frames into the coordinator, queued messages out.
async fn handle_socket(socket: WebSocket, coordinator: Arc<Coordinator>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (connection, mut outbound) = coordinator.connect();

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(message) = queued else { break };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(connection = %connection, "Failed to encode {}: {}", message.kind(), e);
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = coordinator.handle_text(connection, &text) {
                            debug!(connection = %connection, error = %e, "Message not delivered");
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(connection = %connection, "WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    coordinator.disconnect(connection);
}
