//! # Media negotiation
//!
//! A [`MediaNegotiator`] owns at most one peer connection at a time. The call
//! session drives it through the offer/answer exchange and receives its
//! asynchronous callbacks as [`NegotiatorEvent`]s.
//!
//! ```text
//!   CallSession ── open / create_offer / apply_remote_description ──► MediaNegotiator
//!        ▲                                                                 │
//!        └──── (generation, NegotiatorEvent) ◄── candidate / state / track ┘
//! ```
//!
//! Each [`open`](MediaNegotiator::open) starts a new *generation*. Events are
//! tagged with the generation of the peer connection that produced them so
//! that late callbacks from a connection that was already replaced are
//! ignored by the session.

pub mod webrtc;

use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

use portero_signaling_core::{IceCandidate, SessionDescription};

use crate::error::ClientResult;
use crate::media::{LocalTracks, MediaKind, RemoteTrack};

pub use self::webrtc::WebRtcNegotiator;

/// Peer connection state as seen by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerState {
    /// States that end the call
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PeerState::Disconnected | PeerState::Failed | PeerState::Closed
        )
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerState::New => "new",
            PeerState::Connecting => "connecting",
            PeerState::Connected => "connected",
            PeerState::Disconnected => "disconnected",
            PeerState::Failed => "failed",
            PeerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum NegotiatorEvent {
    /// A local candidate was gathered
    LocalCandidate(IceCandidate),
    /// No more local candidates will be gathered
    GatheringComplete,
    ConnectionStateChanged(PeerState),
    RemoteTrack(RemoteTrack),
}

/// Generation-tagged sender handed to [`MediaNegotiator::open`]
#[derive(Debug, Clone)]
pub struct NegotiatorEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, NegotiatorEvent)>,
}

impl NegotiatorEventSender {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, NegotiatorEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forward an event; returns false once the session has gone away
    pub fn emit(&self, event: NegotiatorEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }
}

#[async_trait]
pub trait MediaNegotiator: Send + Sync {
    /// Create a fresh peer connection, closing any previous one first, and
    /// attach `tracks`. Kinds without a local track are negotiated receive-only.
    async fn open(&self, tracks: LocalTracks, events: NegotiatorEventSender) -> ClientResult<()>;

    /// Create an offer and set it as the local description
    async fn create_offer(&self) -> ClientResult<SessionDescription>;

    /// Create an answer and set it as the local description
    async fn create_answer(&self) -> ClientResult<SessionDescription>;

    async fn apply_remote_description(&self, description: SessionDescription) -> ClientResult<()>;

    /// Fails with [`ClientError::NoRemoteDescription`](crate::ClientError::NoRemoteDescription)
    /// and changes nothing when no remote description is set yet
    async fn add_remote_ice_candidate(&self, candidate: IceCandidate) -> ClientResult<()>;

    /// Current local description, including candidates gathered so far
    async fn local_description(&self) -> Option<SessionDescription>;

    async fn has_remote_description(&self) -> bool;

    /// Whether a local offer is outstanding
    async fn awaiting_answer(&self) -> bool;

    /// Stop or resume sending the local track of `kind`; persists across `open`
    async fn set_track_enabled(&self, kind: MediaKind, enabled: bool) -> ClientResult<()>;

    /// Close the peer connection and release tracks. Idempotent.
    async fn close(&self) -> ClientResult<()>;
}
