//! [`MediaNegotiator`] backed by a webrtc-rs peer connection

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::TrackLocal;

use portero_signaling_core::{IceCandidate, SdpType, SessionDescription};

use super::{MediaNegotiator, NegotiatorEvent, NegotiatorEventSender, PeerState};
use crate::config::IceServerConfig;
use crate::error::{ClientError, ClientResult};
use crate::media::{LocalTracks, MediaKind, RemoteTrack};

struct OutboundTrack {
    kind: MediaKind,
    sender: Arc<RTCRtpSender>,
    track: Arc<dyn TrackLocal + Send + Sync>,
}

struct OpenPeer {
    pc: Arc<RTCPeerConnection>,
    outbound: Vec<OutboundTrack>,
}

/// Peer connection per call, created fresh on every [`open`](MediaNegotiator::open)
pub struct WebRtcNegotiator {
    ice_servers: Vec<RTCIceServer>,
    peer: Mutex<Option<OpenPeer>>,
    enabled: parking_lot::Mutex<HashMap<MediaKind, bool>>,
}

impl WebRtcNegotiator {
    pub fn new(ice_servers: &[IceServerConfig]) -> Self {
        let ice_servers = ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        Self {
            ice_servers,
            peer: Mutex::new(None),
            enabled: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn is_enabled(&self, kind: MediaKind) -> bool {
        self.enabled.lock().get(&kind).copied().unwrap_or(true)
    }

    async fn current(&self) -> ClientResult<Arc<RTCPeerConnection>> {
        self.peer
            .lock()
            .await
            .as_ref()
            .map(|peer| peer.pc.clone())
            .ok_or_else(|| ClientError::negotiation("peer connection is not open"))
    }

    async fn build_peer_connection(&self) -> ClientResult<Arc<RTCPeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };
        Ok(Arc::new(api.new_peer_connection(config).await?))
    }

    fn install_callbacks(pc: &Arc<RTCPeerConnection>, events: NegotiatorEventSender) {
        let candidate_events = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let events = candidate_events.clone();
            Box::pin(async move {
                match candidate {
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => {
                            events.emit(NegotiatorEvent::LocalCandidate(IceCandidate {
                                candidate: init.candidate,
                                sdp_mid: init.sdp_mid,
                                sdp_mline_index: init.sdp_mline_index,
                            }));
                        }
                        Err(e) => warn!("Failed to serialize local candidate: {}", e),
                    },
                    None => {
                        events.emit(NegotiatorEvent::GatheringComplete);
                    }
                }
            })
        }));

        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let events = state_events.clone();
            Box::pin(async move {
                debug!(generation = events.generation(), "Peer connection state: {}", state);
                events.emit(NegotiatorEvent::ConnectionStateChanged(peer_state(state)));
            })
        }));

        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let events = events.clone();
            Box::pin(async move {
                let Some(kind) = MediaKind::from_codec_type(track.kind()) else {
                    return;
                };
                info!(kind = %kind, ssrc = track.ssrc(), "Remote track received");
                events.emit(NegotiatorEvent::RemoteTrack(RemoteTrack {
                    id: track.id(),
                    kind,
                    stream_id: track.stream_id(),
                    track: Some(track),
                }));
            })
        }));
    }
}

#[async_trait]
impl MediaNegotiator for WebRtcNegotiator {
    async fn open(&self, tracks: LocalTracks, events: NegotiatorEventSender) -> ClientResult<()> {
        self.close().await?;

        let pc = self.build_peer_connection().await?;
        let mut outbound = Vec::new();

        for kind in MediaKind::ALL {
            let mut has_track = false;
            for local in tracks.iter().filter(|t| t.kind == kind) {
                let sender = pc.add_track(local.track.clone()).await?;
                if !self.is_enabled(kind) {
                    sender.replace_track(None).await?;
                }
                outbound.push(OutboundTrack {
                    kind,
                    sender,
                    track: local.track.clone(),
                });
                has_track = true;
            }

            if !has_track {
                pc.add_transceiver_from_kind(
                    kind.codec_type(),
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await?;
                debug!(kind = %kind, "No local track, receiving only");
            }
        }

        Self::install_callbacks(&pc, events.clone());
        info!(
            generation = events.generation(),
            outbound = outbound.len(),
            "Peer connection opened"
        );
        *self.peer.lock().await = Some(OpenPeer { pc, outbound });
        Ok(())
    }

    async fn create_offer(&self) -> ClientResult<SessionDescription> {
        let pc = self.current().await?;
        let offer = pc.create_offer(None).await?;
        pc.set_local_description(offer.clone()).await?;
        Ok(to_description(&offer))
    }

    async fn create_answer(&self) -> ClientResult<SessionDescription> {
        let pc = self.current().await?;
        let answer = pc.create_answer(None).await?;
        pc.set_local_description(answer.clone()).await?;
        Ok(to_description(&answer))
    }

    async fn apply_remote_description(&self, description: SessionDescription) -> ClientResult<()> {
        let pc = self.current().await?;
        pc.set_remote_description(from_description(description)?).await?;
        Ok(())
    }

    async fn add_remote_ice_candidate(&self, candidate: IceCandidate) -> ClientResult<()> {
        let pc = self
            .current()
            .await
            .map_err(|_| ClientError::NoRemoteDescription)?;
        if pc.remote_description().await.is_none() {
            return Err(ClientError::NoRemoteDescription);
        }

        pc.add_ice_candidate(RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        })
        .await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let pc = self.current().await.ok()?;
        pc.local_description().await.map(|d| to_description(&d))
    }

    async fn has_remote_description(&self) -> bool {
        match self.current().await {
            Ok(pc) => pc.remote_description().await.is_some(),
            Err(_) => false,
        }
    }

    async fn awaiting_answer(&self) -> bool {
        match self.current().await {
            Ok(pc) => pc.signaling_state() == RTCSignalingState::HaveLocalOffer,
            Err(_) => false,
        }
    }

    async fn set_track_enabled(&self, kind: MediaKind, enabled: bool) -> ClientResult<()> {
        self.enabled.lock().insert(kind, enabled);

        let targets: Vec<(Arc<RTCRtpSender>, Arc<dyn TrackLocal + Send + Sync>)> = match &*self.peer.lock().await {
            Some(peer) => peer
                .outbound
                .iter()
                .filter(|o| o.kind == kind)
                .map(|o| (o.sender.clone(), o.track.clone()))
                .collect(),
            None => Vec::new(),
        };

        for (sender, track) in targets {
            sender
                .replace_track(if enabled { Some(track) } else { None })
                .await?;
        }
        debug!(kind = %kind, enabled, "Local track toggled");
        Ok(())
    }

    async fn close(&self) -> ClientResult<()> {
        let previous = self.peer.lock().await.take();
        if let Some(peer) = previous {
            peer.pc.close().await?;
            debug!("Peer connection closed");
        }
        Ok(())
    }
}

fn peer_state(state: RTCPeerConnectionState) -> PeerState {
    match state {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => PeerState::New,
        RTCPeerConnectionState::Connecting => PeerState::Connecting,
        RTCPeerConnectionState::Connected => PeerState::Connected,
        RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
        RTCPeerConnectionState::Failed => PeerState::Failed,
        RTCPeerConnectionState::Closed => PeerState::Closed,
    }
}

fn to_description(description: &RTCSessionDescription) -> SessionDescription {
    let sdp_type = match description.sdp_type {
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        _ => SdpType::Offer,
    };
    SessionDescription {
        sdp_type,
        sdp: description.sdp.clone(),
    }
}

fn from_description(description: SessionDescription) -> ClientResult<RTCSessionDescription> {
    let converted = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(description.sdp)?,
        SdpType::Pranswer => RTCSessionDescription::pranswer(description.sdp)?,
        SdpType::Rollback => serde_json::from_value(serde_json::json!({
            "type": "rollback",
            "sdp": description.sdp,
        }))?,
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn events() -> (NegotiatorEventSender, mpsc::UnboundedReceiver<(u64, NegotiatorEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (NegotiatorEventSender::new(1, tx), rx)
    }

    #[tokio::test]
    async fn candidate_before_remote_description_is_refused() {
        let negotiator = WebRtcNegotiator::new(&[]);
        let candidate = IceCandidate {
            candidate: "candidate:1 1 udp 2130706431 192.168.1.5 50000 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
        };

        assert!(matches!(
            negotiator.add_remote_ice_candidate(candidate.clone()).await,
            Err(ClientError::NoRemoteDescription)
        ));

        let (tx, _rx) = events();
        negotiator.open(Vec::new(), tx).await.unwrap();
        assert!(matches!(
            negotiator.add_remote_ice_candidate(candidate).await,
            Err(ClientError::NoRemoteDescription)
        ));
        assert!(!negotiator.has_remote_description().await);
        negotiator.close().await.unwrap();
    }

    #[tokio::test]
    async fn receive_only_offer_answer_exchange() {
        let offerer = WebRtcNegotiator::new(&[]);
        let answerer = WebRtcNegotiator::new(&[]);
        let (offer_tx, _offer_rx) = events();
        let (answer_tx, _answer_rx) = events();
        offerer.open(Vec::new(), offer_tx).await.unwrap();
        answerer.open(Vec::new(), answer_tx).await.unwrap();

        let offer = offerer.create_offer().await.unwrap();
        assert_eq!(offer.sdp_type, SdpType::Offer);
        assert!(offer.sdp.contains("m=audio"));
        assert!(offer.sdp.contains("m=video"));
        assert!(offerer.awaiting_answer().await);

        answerer.apply_remote_description(offer).await.unwrap();
        let answer = answerer.create_answer().await.unwrap();
        assert_eq!(answer.sdp_type, SdpType::Answer);

        offerer.apply_remote_description(answer).await.unwrap();
        assert!(!offerer.awaiting_answer().await);
        assert!(offerer.has_remote_description().await);

        offerer.close().await.unwrap();
        answerer.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let negotiator = WebRtcNegotiator::new(&[]);
        let (tx, _rx) = events();
        negotiator.open(Vec::new(), tx).await.unwrap();

        negotiator.close().await.unwrap();
        negotiator.close().await.unwrap();
        assert!(negotiator.local_description().await.is_none());
    }

    #[tokio::test]
    async fn track_toggle_is_remembered_without_a_peer() {
        let negotiator = WebRtcNegotiator::new(&[]);
        negotiator.set_track_enabled(MediaKind::Audio, false).await.unwrap();
        assert!(!negotiator.is_enabled(MediaKind::Audio));
        assert!(negotiator.is_enabled(MediaKind::Video));
    }
}
