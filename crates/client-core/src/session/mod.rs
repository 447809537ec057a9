//! Call session for one endpoint
//!
//! A [`CallSession`] owns the call state machine of a gatekeeper or a
//! department endpoint. It is driven by a single task that serializes every
//! input: API commands, signaling messages, negotiator callbacks and timers.
//!
//! ```text
//!   CallSessionHandle ──commands──┐
//!   SignalingTransport ──events───┤
//!   MediaNegotiator ────events────┼──► driver task ──► status watch + ClientEventHandler
//!   timers (media / debounce /    │
//!           watchdog) ────────────┘
//! ```
//!
//! Which side creates the offer is fixed by role: the gatekeeper is the
//! [`NegotiationRole::Initiator`] and offers once the department accepts;
//! every other role is a [`NegotiationRole::Responder`] and answers.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use portero_client_core::{
//!     CallSession, ClientConfig, LocalMediaSource, WebRtcNegotiator, WebSocketTransport,
//! };
//!
//! # async fn example() -> portero_client_core::ClientResult<()> {
//! let config = ClientConfig::new("Portero").with_server_url("ws://192.168.1.20:3000/ws");
//! let (transport, events) =
//!     WebSocketTransport::connect(&config.server_url, config.role.clone(), config.reconnect.clone())?;
//! let negotiator = Arc::new(WebRtcNegotiator::new(&config.ice_servers));
//!
//! let (session, _driver) =
//!     CallSession::new(config, transport, events, negotiator, LocalMediaSource::ready(Vec::new()))
//!         .spawn();
//! session.initiate("Soporte").await?;
//! # Ok(())
//! # }
//! ```

mod driver;
pub mod state;

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use portero_signaling_core::Role;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEventHandler, NoopEventHandler};
use crate::media::LocalMediaSource;
use crate::negotiator::MediaNegotiator;
use crate::transport::{SignalingTransport, TransportEvent};

pub use state::{next_status, CallStatus, Transition};

/// Which side of the offer/answer exchange an endpoint takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    /// Places calls and creates offers
    Initiator,
    /// Receives calls and answers offers
    Responder,
}

impl NegotiationRole {
    pub fn for_config(config: &ClientConfig) -> Self {
        if config.is_gatekeeper() {
            NegotiationRole::Initiator
        } else {
            NegotiationRole::Responder
        }
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub peer_role: Option<Role>,
    pub status: CallStatus,
    pub local_tracks_ready: bool,
    pub microphone_muted: bool,
    pub camera_enabled: bool,
}

pub(crate) enum Command {
    Initiate {
        target: Role,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Accept {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Reject {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Hangup {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    SetMicrophoneMuted {
        muted: bool,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    SetCameraEnabled {
        enabled: bool,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Everything a session needs; [`spawn`](CallSession::spawn) starts it
pub struct CallSession {
    config: ClientConfig,
    transport: Arc<dyn SignalingTransport>,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    negotiator: Arc<dyn MediaNegotiator>,
    media: LocalMediaSource,
    handler: Arc<dyn ClientEventHandler>,
}

impl CallSession {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn SignalingTransport>,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        negotiator: Arc<dyn MediaNegotiator>,
        media: LocalMediaSource,
    ) -> Self {
        Self {
            config,
            transport,
            transport_events,
            negotiator,
            media,
            handler: Arc::new(NoopEventHandler),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn ClientEventHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Start the driver task
    pub fn spawn(self) -> (CallSessionHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(CallStatus::Idle);

        let (driver, inbox) = driver::SessionDriver::new(
            self.config,
            self.transport,
            self.negotiator,
            self.media,
            self.handler,
            status_tx,
        );
        let task = tokio::spawn(driver.run(commands_rx, self.transport_events, inbox));

        (
            CallSessionHandle {
                commands: commands_tx,
                status: status_rx,
            },
            task,
        )
    }
}

/// Cloneable control surface of a running session.
///
/// Calls must not be made from inside a [`ClientEventHandler`] callback: the
/// driver is busy running the callback and would never answer. Return a
/// [`CallAction`](crate::events::CallAction) from `on_incoming_call` instead.
#[derive(Clone)]
pub struct CallSessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<CallStatus>,
}

impl CallSessionHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> ClientResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| ClientError::SessionClosed)?;
        response.await.map_err(|_| ClientError::SessionClosed)
    }

    /// Ring `target`. Gatekeeper only, and only while idle.
    pub async fn initiate(&self, target: impl Into<Role>) -> ClientResult<()> {
        let target = target.into();
        self.request(|reply| Command::Initiate { target, reply }).await?
    }

    /// Accept the ringing call
    pub async fn accept(&self) -> ClientResult<()> {
        self.request(|reply| Command::Accept { reply }).await?
    }

    /// Reject the ringing call
    pub async fn reject(&self) -> ClientResult<()> {
        self.request(|reply| Command::Reject { reply }).await?
    }

    /// End the active call and notify the peer
    pub async fn hangup(&self) -> ClientResult<()> {
        self.request(|reply| Command::Hangup { reply }).await?
    }

    pub async fn set_microphone_muted(&self, muted: bool) -> ClientResult<()> {
        self.request(|reply| Command::SetMicrophoneMuted { muted, reply })
            .await?
    }

    pub async fn set_camera_enabled(&self, enabled: bool) -> ClientResult<()> {
        self.request(|reply| Command::SetCameraEnabled { enabled, reply })
            .await?
    }

    pub fn status(&self) -> CallStatus {
        *self.status.borrow()
    }

    /// Receiver for the latest status.
    ///
    /// Changes made in quick succession may be coalesced; use
    /// [`ClientEventHandler::on_call_state_changed`] to see every transition.
    pub fn watch_status(&self) -> watch::Receiver<CallStatus> {
        self.status.clone()
    }

    pub async fn snapshot(&self) -> ClientResult<SessionSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Tear down locally without notifying the peer, then stop the driver
    pub async fn shutdown(&self) -> ClientResult<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
