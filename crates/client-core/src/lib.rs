//! # Portero endpoint client
//!
//! Everything an intercom endpoint needs to place or take a call through the
//! Portero coordinator: the call-session state machine, WebRTC negotiation
//! and the signaling transports.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────── application ────────────────────────┐
//! │   CallSessionHandle                 ClientEventHandler      │
//! └─────────┬────────────────────────────────────▲──────────────┘
//!           │ commands                           │ callbacks
//! ┌─────────▼────────────────────────────────────┴──────────────┐
//! │                  CallSession driver task                     │
//! └───────┬───────────────────────┬──────────────────┬──────────┘
//!         │                       │                  │
//!  SignalingTransport      MediaNegotiator    LocalMediaSource
//!  (WebSocket/loopback)    (webrtc-rs)        (capture readiness)
//! ```
//!
//! - [`session`] - call status machine, offer/answer sequencing, timers
//! - [`negotiator`] - one peer connection at a time, behind a trait
//! - [`transport`] - WebSocket and in-process signaling transports
//! - [`media`] - local track readiness and remote track descriptors
//! - [`events`] - callbacks for the surrounding application
//! - [`config`] - endpoint settings
//! - [`recovery`] - retry with backoff and timeouts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use portero_client_core::{
//!     CallSession, ClientConfig, LocalMediaSource, WebRtcNegotiator, WebSocketTransport,
//! };
//!
//! # async fn example() -> portero_client_core::ClientResult<()> {
//! let config = ClientConfig::load(None)?;
//! config.validate()?;
//!
//! let (transport, events) =
//!     WebSocketTransport::connect(&config.server_url, config.role.clone(), config.reconnect.clone())?;
//! let negotiator = Arc::new(WebRtcNegotiator::new(&config.ice_servers));
//! let media = LocalMediaSource::new();
//!
//! let (session, _driver) = CallSession::new(config, transport, events, negotiator, media.clone()).spawn();
//!
//! // once capture is up
//! media.publish(Vec::new());
//! println!("status: {}", session.status());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod negotiator;
pub mod recovery;
pub mod session;
pub mod transport;

pub use config::{ClientConfig, IceServerConfig};
pub use error::{ClientError, ClientResult};
pub use events::{CallAction, CallEndedInfo, CallStatusInfo, ClientEventHandler, IncomingCallInfo, NoopEventHandler};
pub use media::{LocalMediaSource, LocalTrack, LocalTracks, MediaKind, RemoteTrack};
pub use negotiator::{MediaNegotiator, NegotiatorEvent, NegotiatorEventSender, PeerState, WebRtcNegotiator};
pub use recovery::RetryConfig;
pub use session::{CallSession, CallSessionHandle, CallStatus, NegotiationRole, SessionSnapshot};
pub use transport::{LoopbackTransport, SignalingTransport, TransportEvent, WebSocketTransport};

pub use portero_signaling_core::{IceCandidate, Role, SdpType, SessionDescription};
