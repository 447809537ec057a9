//! Session driver task

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use portero_signaling_core::{ClientMessage, IceCandidate, Role, SdpType, ServerMessage, SessionDescription};

use super::state::{next_status, CallStatus, Transition};
use super::{Command, NegotiationRole, SessionSnapshot};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{CallAction, CallEndedInfo, CallStatusInfo, ClientEventHandler, IncomingCallInfo};
use crate::media::{LocalMediaSource, LocalTracks, MediaKind};
use crate::negotiator::{MediaNegotiator, NegotiatorEvent, NegotiatorEventSender, PeerState};
use crate::transport::{SignalingTransport, TransportEvent};

/// Timer and background-wait completions, tagged with the call epoch they
/// were started in
enum Internal {
    MediaReady {
        epoch: u64,
        result: ClientResult<LocalTracks>,
    },
    DebounceElapsed {
        epoch: u64,
    },
    WatchdogElapsed {
        epoch: u64,
    },
}

/// Receiving ends of the driver's own channels
pub(super) struct DriverInbox {
    negotiator: mpsc::UnboundedReceiver<(u64, NegotiatorEvent)>,
    internal: mpsc::UnboundedReceiver<Internal>,
}

struct Timers {
    media_wait: Option<JoinHandle<()>>,
    debounce: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
}

impl Timers {
    fn new() -> Self {
        Self {
            media_wait: None,
            debounce: None,
            watchdog: None,
        }
    }

    fn cancel_all(&mut self) {
        for handle in [
            self.media_wait.take(),
            self.debounce.take(),
            self.watchdog.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

pub(super) struct SessionDriver {
    config: ClientConfig,
    negotiation_role: NegotiationRole,
    transport: Arc<dyn SignalingTransport>,
    negotiator: Arc<dyn MediaNegotiator>,
    media: LocalMediaSource,
    handler: Arc<dyn ClientEventHandler>,
    status: watch::Sender<CallStatus>,

    negotiator_tx: mpsc::UnboundedSender<(u64, NegotiatorEvent)>,
    internal_tx: mpsc::UnboundedSender<Internal>,

    peer: Option<Role>,
    /// Bumped on every teardown so late timers are recognizable
    epoch: u64,
    /// Bumped on every peer connection (re)creation
    generation: u64,
    peer_open: bool,
    local_tracks: Option<LocalTracks>,
    pending_offer: Option<SessionDescription>,
    pending_candidates: Vec<IceCandidate>,
    /// Local description created but not yet sent (debounced mode)
    unsent_description: Option<SdpType>,
    remote_track_seen: bool,
    watchdog_used: bool,
    microphone_muted: bool,
    camera_enabled: bool,
    timers: Timers,
}

impl SessionDriver {
    pub(super) fn new(
        config: ClientConfig,
        transport: Arc<dyn SignalingTransport>,
        negotiator: Arc<dyn MediaNegotiator>,
        media: LocalMediaSource,
        handler: Arc<dyn ClientEventHandler>,
        status: watch::Sender<CallStatus>,
    ) -> (Self, DriverInbox) {
        let (negotiator_tx, negotiator_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let driver = Self {
            negotiation_role: NegotiationRole::for_config(&config),
            config,
            transport,
            negotiator,
            media,
            handler,
            status,
            negotiator_tx,
            internal_tx,
            peer: None,
            epoch: 0,
            generation: 0,
            peer_open: false,
            local_tracks: None,
            pending_offer: None,
            pending_candidates: Vec::new(),
            unsent_description: None,
            remote_track_seen: false,
            watchdog_used: false,
            microphone_muted: false,
            camera_enabled: true,
            timers: Timers::new(),
        };
        let inbox = DriverInbox {
            negotiator: negotiator_rx,
            internal: internal_rx,
        };
        (driver, inbox)
    }

    pub(super) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        inbox: DriverInbox,
    ) {
        let DriverInbox {
            negotiator: mut negotiator_rx,
            internal: mut internal_rx,
        } = inbox;
        let mut transport_open = true;

        info!(
            role = %self.config.role,
            negotiation_role = ?self.negotiation_role,
            "Call session started"
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        self.teardown(Transition::Hangup, "Session dropped".to_string(), false, false).await;
                        break;
                    }
                },
                event = transport_events.recv(), if transport_open => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => {
                        warn!(role = %self.config.role, "Signaling transport stopped");
                        transport_open = false;
                    }
                },
                Some((generation, event)) = negotiator_rx.recv() => {
                    self.handle_negotiator_event(generation, event).await;
                }
                Some(internal) = internal_rx.recv() => self.handle_internal(internal).await,
            }
        }

        info!(role = %self.config.role, "Call session stopped");
    }

    fn current_status(&self) -> CallStatus {
        *self.status.borrow()
    }

    /// Check `transition` against the current status without applying it
    fn check(&self, transition: Transition) -> ClientResult<CallStatus> {
        let status = self.current_status();
        next_status(status, transition).ok_or(ClientError::InvalidTransition {
            operation: transition.operation(),
            status,
        })
    }

    async fn transition(&mut self, transition: Transition) -> ClientResult<CallStatus> {
        let previous = self.current_status();
        let next = self.check(transition)?;
        if next != previous {
            self.status.send_replace(next);
            info!(
                role = %self.config.role,
                peer = ?self.peer.as_ref().map(Role::as_str),
                from = %previous,
                to = %next,
                "Call status changed"
            );
            self.handler
                .on_call_state_changed(CallStatusInfo {
                    peer_role: self.peer.clone(),
                    previous,
                    status: next,
                    timestamp: Utc::now(),
                })
                .await;
        }
        Ok(next)
    }

    async fn status_line(&self, line: String) {
        info!(role = %self.config.role, "{}", line);
        self.handler.on_status(line).await;
    }

    async fn signal(&self, message: ClientMessage) -> ClientResult<()> {
        debug!(role = %self.config.role, kind = message.kind(), "Sending signaling message");
        self.transport.send(message).await
    }

    fn is_peer(&self, role: &Role) -> bool {
        self.peer.as_ref() == Some(role)
    }

    // --- commands ---------------------------------------------------------

    /// Returns `false` once the session should stop
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Initiate { target, reply } => {
                let _ = reply.send(self.initiate(target).await);
            }
            Command::Accept { reply } => {
                let _ = reply.send(self.accept().await);
            }
            Command::Reject { reply } => {
                let _ = reply.send(self.reject().await);
            }
            Command::Hangup { reply } => {
                let _ = reply.send(self.hangup().await);
            }
            Command::SetMicrophoneMuted { muted, reply } => {
                self.microphone_muted = muted;
                let result = self.negotiator.set_track_enabled(MediaKind::Audio, !muted).await;
                let _ = reply.send(result);
            }
            Command::SetCameraEnabled { enabled, reply } => {
                self.camera_enabled = enabled;
                let result = self.negotiator.set_track_enabled(MediaKind::Video, enabled).await;
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown { reply } => {
                self.teardown(Transition::Hangup, "Session shut down".to_string(), false, false).await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            peer_role: self.peer.clone(),
            status: self.current_status(),
            local_tracks_ready: self.media.is_ready(),
            microphone_muted: self.microphone_muted,
            camera_enabled: self.camera_enabled,
        }
    }

    async fn initiate(&mut self, target: Role) -> ClientResult<()> {
        if self.negotiation_role != NegotiationRole::Initiator {
            return Err(ClientError::invalid_configuration(
                "role",
                format!("only {} places calls", self.config.gatekeeper_role),
            ));
        }
        self.check(Transition::Initiate)?;

        self.signal(ClientMessage::InitiateCall {
            target: target.clone(),
        })
        .await?;
        self.peer = Some(target.clone());
        self.transition(Transition::Initiate).await?;
        self.status_line(format!("Calling {}", target)).await;
        Ok(())
    }

    async fn accept(&mut self) -> ClientResult<()> {
        self.check(Transition::Accept)?;
        self.signal(ClientMessage::AcceptCall).await?;
        self.transition(Transition::Accept).await?;
        self.status_line("Call accepted, waiting for local media".to_string())
            .await;
        self.wait_for_media();
        Ok(())
    }

    async fn reject(&mut self) -> ClientResult<()> {
        self.check(Transition::Reject)?;
        self.signal(ClientMessage::RejectCall).await?;
        self.transition(Transition::Reject).await?;
        if let Some(caller) = self.peer.take() {
            self.status_line(format!("Rejected call from {}", caller)).await;
        }
        Ok(())
    }

    async fn hangup(&mut self) -> ClientResult<()> {
        self.check(Transition::Hangup)?;
        self.teardown(Transition::Hangup, "Call ended locally".to_string(), true, false)
            .await;
        Ok(())
    }

    // --- signaling --------------------------------------------------------

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.status_line(format!("Registered as {}", self.config.role))
                    .await;
                self.handler.on_network_event(true, None).await;
            }
            TransportEvent::Disconnected { reason } => {
                warn!(role = %self.config.role, reason = %reason, "Signaling disconnected");
                self.handler.on_network_event(false, Some(reason)).await;
            }
            TransportEvent::Message(message) => self.handle_server_message(message).await,
        }
    }

    async fn handle_server_message(&mut self, message: ServerMessage) {
        debug!(role = %self.config.role, kind = message.kind(), "Received signaling message");

        match message {
            ServerMessage::RosterChanged { roles } => {
                self.handler.on_roster_changed(roles).await;
            }
            ServerMessage::IncomingCall { caller } => self.on_incoming(caller).await,
            ServerMessage::CallAccepted { responder } => {
                if self.negotiation_role == NegotiationRole::Initiator
                    && self.current_status() == CallStatus::Calling
                    && self.is_peer(&responder)
                {
                    self.status_line(format!("{} accepted, waiting for local media", responder))
                        .await;
                    self.wait_for_media();
                } else {
                    debug!(responder = %responder, "Ignoring unexpected callAccepted");
                }
            }
            ServerMessage::CallRejected { responder } => {
                if self.current_status() == CallStatus::Calling && self.is_peer(&responder) {
                    self.on_rejected(responder).await;
                } else {
                    debug!(responder = %responder, "Ignoring unexpected callRejected");
                }
            }
            ServerMessage::Offer { from, description } => {
                if self.negotiation_role == NegotiationRole::Responder
                    && self.is_peer(&from)
                    && matches!(self.current_status(), CallStatus::Calling | CallStatus::Connected)
                {
                    if let Err(e) = self.process_offer(description).await {
                        self.fail(e).await;
                    }
                } else {
                    debug!(from = %from, "Ignoring unexpected offer");
                }
            }
            ServerMessage::Answer { from, description } => {
                if self.negotiation_role == NegotiationRole::Initiator
                    && self.is_peer(&from)
                    && matches!(self.current_status(), CallStatus::Calling | CallStatus::Connected)
                {
                    if let Err(e) = self.process_answer(description).await {
                        self.fail(e).await;
                    }
                } else {
                    debug!(from = %from, "Ignoring unexpected answer");
                }
            }
            ServerMessage::IceCandidate { from, candidate } => {
                if self.is_peer(&from) && self.current_status().is_active() {
                    self.on_remote_candidate(candidate).await;
                } else {
                    debug!(from = %from, "Ignoring candidate outside a call");
                }
            }
            ServerMessage::EndCall { from } => {
                if self.is_peer(&from) && self.current_status().is_active() {
                    self.teardown(Transition::Hangup, format!("Call ended by {}", from), false, true)
                        .await;
                } else {
                    debug!(from = %from, "Ignoring endCall outside a call");
                }
            }
            ServerMessage::RoutingError { message } => {
                let error = ClientError::TargetUnavailable { message };
                warn!(role = %self.config.role, error = %error, "Routing error");
                self.handler.on_error(&error).await;
                if self.current_status() == CallStatus::Calling {
                    self.teardown(Transition::Hangup, error.to_string(), false, false)
                        .await;
                }
            }
        }
    }

    async fn on_incoming(&mut self, caller: Role) {
        if self.current_status() != CallStatus::Idle {
            info!(role = %self.config.role, caller = %caller, "Busy, rejecting incoming call");
            if let Err(e) = self.signal(ClientMessage::RejectCall).await {
                warn!(error = %e, "Failed to reject call while busy");
            }
            return;
        }

        self.peer = Some(caller.clone());
        if self.transition(Transition::Incoming).await.is_err() {
            self.peer = None;
            return;
        }
        self.status_line(format!("Incoming call from {}", caller)).await;

        let action = self
            .handler
            .on_incoming_call(IncomingCallInfo {
                caller,
                received_at: Utc::now(),
            })
            .await;

        let result = match action {
            CallAction::Accept => self.accept().await,
            CallAction::Reject => self.reject().await,
            CallAction::Defer => Ok(()),
        };
        if let Err(e) = result {
            self.fail(e).await;
        }
    }

    async fn on_rejected(&mut self, responder: Role) {
        self.release_call_resources().await;
        if let Err(e) = self.transition(Transition::Rejected).await {
            warn!(error = %e, "Unexpected rejection");
        }
        self.peer = None;
        self.status_line(format!("{} rejected the call", responder)).await;
        self.handler.on_call_rejected(responder).await;
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        if !self.peer_open || !self.negotiator.has_remote_description().await {
            debug!("Buffering remote candidate until the remote description is set");
            self.pending_candidates.push(candidate);
            return;
        }

        match self.negotiator.add_remote_ice_candidate(candidate.clone()).await {
            Ok(()) => {}
            Err(ClientError::NoRemoteDescription) => self.pending_candidates.push(candidate),
            Err(e) => warn!(error = %e, "Failed to add remote candidate"),
        }
    }

    async fn flush_candidates(&mut self) {
        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(e) = self.negotiator.add_remote_ice_candidate(candidate).await {
                warn!(error = %e, "Dropping buffered remote candidate");
            }
        }
    }

    // --- negotiation ------------------------------------------------------

    fn wait_for_media(&mut self) {
        let media = self.media.clone();
        let timeout = self.config.media_ready_timeout();
        let events = self.internal_tx.clone();
        let epoch = self.epoch;

        if let Some(previous) = self.timers.media_wait.take() {
            previous.abort();
        }
        self.timers.media_wait = Some(tokio::spawn(async move {
            let result = media.wait_ready(timeout).await;
            let _ = events.send(Internal::MediaReady { epoch, result });
        }));
    }

    async fn on_media_ready(&mut self, tracks: LocalTracks) -> ClientResult<()> {
        self.local_tracks = Some(tracks);
        self.open_peer().await?;

        match self.negotiation_role {
            NegotiationRole::Initiator => self.send_offer().await,
            NegotiationRole::Responder => match self.pending_offer.take() {
                Some(offer) => self.process_offer(offer).await,
                None => {
                    self.status_line("Waiting for offer".to_string()).await;
                    Ok(())
                }
            },
        }
    }

    async fn open_peer(&mut self) -> ClientResult<()> {
        let tracks = self.local_tracks.clone().unwrap_or_default();
        self.generation += 1;
        let events = NegotiatorEventSender::new(self.generation, self.negotiator_tx.clone());

        self.negotiator.open(tracks, events).await?;
        self.peer_open = true;
        self.remote_track_seen = false;
        debug!(role = %self.config.role, generation = self.generation, "Peer connection opened");
        Ok(())
    }

    async fn send_offer(&mut self) -> ClientResult<()> {
        let offer = self.negotiator.create_offer().await?;
        self.status_line("Sending offer".to_string()).await;
        self.publish_local(offer).await
    }

    async fn process_offer(&mut self, offer: SessionDescription) -> ClientResult<()> {
        if !self.peer_open {
            debug!("Offer arrived before local media; holding it");
            self.pending_offer = Some(offer);
            return Ok(());
        }

        if self.negotiator.has_remote_description().await {
            info!(role = %self.config.role, "Renegotiating on a fresh peer connection");
            self.open_peer().await?;
        }

        self.negotiator.apply_remote_description(offer).await?;
        self.flush_candidates().await;

        let answer = self.negotiator.create_answer().await?;
        self.status_line("Sending answer".to_string()).await;
        self.publish_local(answer).await?;
        self.connected().await
    }

    async fn process_answer(&mut self, answer: SessionDescription) -> ClientResult<()> {
        if !self.negotiator.awaiting_answer().await {
            debug!("Ignoring answer with no outstanding offer");
            return Ok(());
        }

        self.negotiator.apply_remote_description(answer).await?;
        self.flush_candidates().await;
        self.connected().await?;

        if self.timers.watchdog.is_none() && !self.watchdog_used {
            self.start_watchdog();
        }
        Ok(())
    }

    async fn connected(&mut self) -> ClientResult<()> {
        let previous = self.current_status();
        self.transition(Transition::RemoteDescriptionProcessed).await?;
        if previous != CallStatus::Connected {
            if let Some(peer) = &self.peer {
                self.status_line(format!("Connected with {}", peer)).await;
            }
        }
        Ok(())
    }

    /// Send a local description now (trickle) or after the debounce window
    async fn publish_local(&mut self, description: SessionDescription) -> ClientResult<()> {
        match self.config.candidate_debounce() {
            None => self.send_description(description).await,
            Some(window) => {
                self.unsent_description = Some(description.sdp_type);
                self.start_debounce(window);
                Ok(())
            }
        }
    }

    async fn send_description(&self, description: SessionDescription) -> ClientResult<()> {
        let Some(target) = self.peer.clone() else {
            return Ok(());
        };
        let message = match description.sdp_type {
            SdpType::Answer | SdpType::Pranswer => ClientMessage::Answer { target, description },
            SdpType::Offer | SdpType::Rollback => ClientMessage::Offer { target, description },
        };
        self.signal(message).await
    }

    /// Send the accumulated local description held back by the debounce
    async fn flush_local_description(&mut self) -> ClientResult<()> {
        let Some(sdp_type) = self.unsent_description.take() else {
            return Ok(());
        };
        if let Some(timer) = self.timers.debounce.take() {
            timer.abort();
        }

        let mut description = self
            .negotiator
            .local_description()
            .await
            .ok_or_else(|| ClientError::negotiation("local description missing"))?;
        description.sdp_type = sdp_type;
        self.send_description(description).await
    }

    fn start_debounce(&mut self, window: Duration) {
        if let Some(previous) = self.timers.debounce.take() {
            previous.abort();
        }
        let events = self.internal_tx.clone();
        let epoch = self.epoch;
        self.timers.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = events.send(Internal::DebounceElapsed { epoch });
        }));
    }

    fn start_watchdog(&mut self) {
        let window = self.config.media_watchdog();
        let events = self.internal_tx.clone();
        let epoch = self.epoch;
        self.timers.watchdog = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = events.send(Internal::WatchdogElapsed { epoch });
        }));
    }

    async fn on_watchdog(&mut self) -> ClientResult<()> {
        self.timers.watchdog = None;
        if self.current_status() != CallStatus::Connected
            || self.remote_track_seen
            || self.watchdog_used
        {
            return Ok(());
        }

        self.watchdog_used = true;
        warn!(role = %self.config.role, "No remote media after connecting, renegotiating once");
        self.status_line("No remote media, retrying connection".to_string())
            .await;
        self.open_peer().await?;
        self.send_offer().await
    }

    // --- negotiator and timer events -------------------------------------

    async fn handle_negotiator_event(&mut self, generation: u64, event: NegotiatorEvent) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "Ignoring event from a replaced peer connection");
            return;
        }

        match event {
            NegotiatorEvent::LocalCandidate(candidate) => {
                // Debounced mode folds candidates into the pending description
                if self.unsent_description.is_some() {
                    return;
                }
                if let Some(target) = self.peer.clone() {
                    if let Err(e) = self.signal(ClientMessage::IceCandidate { target, candidate }).await {
                        warn!(error = %e, "Failed to send local candidate");
                    }
                }
            }
            NegotiatorEvent::GatheringComplete => {
                if self.unsent_description.is_some() {
                    debug!("Gathering complete before the debounce window; sending now");
                    if let Err(e) = self.flush_local_description().await {
                        self.fail(e).await;
                    }
                }
            }
            NegotiatorEvent::ConnectionStateChanged(state) => {
                debug!(role = %self.config.role, state = %state, "Peer connection state");
                if state.is_terminal()
                    && matches!(self.current_status(), CallStatus::Calling | CallStatus::Connected)
                {
                    self.on_peer_lost(state).await;
                }
            }
            NegotiatorEvent::RemoteTrack(track) => {
                self.remote_track_seen = true;
                if let Some(watchdog) = self.timers.watchdog.take() {
                    watchdog.abort();
                }
                self.status_line(format!("Receiving remote {}", track.kind)).await;
                self.handler.on_remote_track(track).await;
            }
        }
    }

    async fn on_peer_lost(&mut self, state: PeerState) {
        let error = ClientError::PeerConnectionFailed {
            state: state.to_string(),
        };
        warn!(role = %self.config.role, error = %error, "Peer connection lost");
        self.handler.on_error(&error).await;
        self.teardown(Transition::PeerConnectionLost, error.to_string(), true, true)
            .await;
    }

    async fn handle_internal(&mut self, event: Internal) {
        let result = match event {
            Internal::MediaReady { epoch, result } if epoch == self.epoch => {
                self.timers.media_wait = None;
                match result {
                    Ok(tracks) => self.on_media_ready(tracks).await,
                    Err(e) => Err(e),
                }
            }
            Internal::DebounceElapsed { epoch } if epoch == self.epoch => {
                self.timers.debounce = None;
                self.flush_local_description().await
            }
            Internal::WatchdogElapsed { epoch } if epoch == self.epoch => self.on_watchdog().await,
            _ => {
                debug!("Ignoring timer from a finished call");
                Ok(())
            }
        };

        if let Err(e) = result {
            self.fail(e).await;
        }
    }

    // --- teardown ---------------------------------------------------------

    /// Report `error` and end the call the same way a hangup would
    async fn fail(&mut self, error: ClientError) {
        warn!(
            role = %self.config.role,
            category = error.category(),
            error = %error,
            "Call failed"
        );
        self.handler.on_error(&error).await;
        self.teardown(Transition::Hangup, error.to_string(), true, false)
            .await;
    }

    /// Stop timers, invalidate outstanding callbacks and close the peer connection
    async fn release_call_resources(&mut self) {
        self.timers.cancel_all();
        self.epoch += 1;
        self.generation += 1;

        if let Err(e) = self.negotiator.close().await {
            warn!(error = %e, "Failed to close peer connection");
        }
        self.peer_open = false;
        self.local_tracks = None;
        self.pending_offer = None;
        self.pending_candidates.clear();
        self.unsent_description = None;
        self.remote_track_seen = false;
        self.watchdog_used = false;
    }

    async fn teardown(&mut self, transition: Transition, reason: String, notify: bool, remote: bool) {
        if !self.current_status().is_active() {
            return;
        }

        if notify {
            if let Some(target) = self.peer.clone() {
                if let Err(e) = self.signal(ClientMessage::EndCall { target }).await {
                    warn!(error = %e, "Failed to notify peer of call end");
                }
            }
        }
        self.release_call_resources().await;

        if let Err(e) = self.transition(transition).await {
            warn!(error = %e, "Teardown from unexpected status");
            self.status.send_replace(CallStatus::Ended);
        }
        self.status_line(reason.clone()).await;
        self.handler
            .on_call_ended(CallEndedInfo {
                peer_role: self.peer.clone(),
                reason,
                remote,
                timestamp: Utc::now(),
            })
            .await;

        if let Err(e) = self.transition(Transition::Reset).await {
            warn!(error = %e, "Failed to reset after teardown");
        }
        self.peer = None;
    }
}
