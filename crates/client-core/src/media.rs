//! Local media readiness and remote track descriptors
//!
//! Capture itself lives outside this crate. The capturing side publishes its
//! outbound tracks into a [`LocalMediaSource`] once they exist (or reports
//! why they could not be created), and the call session awaits that signal
//! with a bounded timeout instead of polling for it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];

    pub fn codec_type(self) -> RTPCodecType {
        match self {
            MediaKind::Audio => RTPCodecType::Audio,
            MediaKind::Video => RTPCodecType::Video,
        }
    }

    pub fn from_codec_type(codec_type: RTPCodecType) -> Option<Self> {
        match codec_type {
            RTPCodecType::Audio => Some(MediaKind::Audio),
            RTPCodecType::Video => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// An outbound track supplied by the capture side
#[derive(Clone)]
pub struct LocalTrack {
    pub kind: MediaKind,
    pub track: Arc<dyn TrackLocal + Send + Sync>,
}

impl LocalTrack {
    pub fn new(kind: MediaKind, track: Arc<dyn TrackLocal + Send + Sync>) -> Self {
        Self { kind, track }
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("kind", &self.kind)
            .field("id", &self.track.id())
            .finish()
    }
}

pub type LocalTracks = Vec<LocalTrack>;

/// A track announced by the remote peer
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: MediaKind,
    pub stream_id: String,
    /// Handle for reading RTP; absent for negotiators without a real peer connection
    pub track: Option<Arc<TrackRemote>>,
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stream_id", &self.stream_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
enum MediaState {
    Pending,
    Ready(LocalTracks),
    Failed(String),
}

/// Readiness signal for local capture, shared between the capture side and
/// the call session
#[derive(Debug, Clone)]
pub struct LocalMediaSource {
    state: Arc<watch::Sender<MediaState>>,
}

impl Default for LocalMediaSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalMediaSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(MediaState::Pending);
        Self { state: Arc::new(tx) }
    }

    /// Source that is ready from the start with `tracks`
    pub fn ready(tracks: LocalTracks) -> Self {
        let source = Self::new();
        source.publish(tracks);
        source
    }

    /// Capture is up; an empty list means receive-only
    pub fn publish(&self, tracks: LocalTracks) {
        debug!(tracks = tracks.len(), "Local media published");
        self.state.send_replace(MediaState::Ready(tracks));
    }

    /// Capture failed for good
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "Local media failed");
        self.state.send_replace(MediaState::Failed(reason));
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), MediaState::Ready(_))
    }

    /// Wait for published tracks, at most `timeout`
    ///
    /// ```rust
    /// # use portero_client_core::LocalMediaSource;
    /// # use std::time::Duration;
    /// let media = LocalMediaSource::new();
    /// media.publish(Vec::new());
    ///
    /// # tokio_test::block_on(async {
    /// let tracks = media.wait_ready(Duration::from_secs(2)).await.unwrap();
    /// assert!(tracks.is_empty());
    /// # })
    /// ```
    pub async fn wait_ready(&self, timeout: Duration) -> ClientResult<LocalTracks> {
        let mut rx = self.state.subscribe();
        let wait = async {
            loop {
                let state = rx.borrow_and_update().clone();
                match state {
                    MediaState::Ready(tracks) => return Ok(tracks),
                    MediaState::Failed(reason) => {
                        return Err(ClientError::MediaUnavailable { reason })
                    }
                    MediaState::Pending => {}
                }
                if rx.changed().await.is_err() {
                    return Err(ClientError::MediaUnavailable {
                        reason: "media source dropped".to_string(),
                    });
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::MediaUnavailable {
                reason: format!("local media not ready after {}ms", timeout.as_millis()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_when_nothing_is_published() {
        let source = LocalMediaSource::new();
        let err = source.wait_ready(Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, ClientError::MediaUnavailable { reason } if reason.contains("2000ms")));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_wakes_on_publish() {
        let source = LocalMediaSource::new();
        let publisher = source.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            publisher.publish(Vec::new());
        });

        let tracks = source.wait_ready(Duration::from_secs(2)).await.unwrap();
        assert!(tracks.is_empty());
        assert!(source.is_ready());
    }

    #[tokio::test]
    async fn failure_is_reported_immediately() {
        let source = LocalMediaSource::new();
        source.fail("camera permission denied");
        let err = source.wait_ready(Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, ClientError::MediaUnavailable { reason } if reason == "camera permission denied"));
    }

    #[test]
    fn kinds_map_to_codec_types() {
        for kind in MediaKind::ALL {
            assert_eq!(MediaKind::from_codec_type(kind.codec_type()), Some(kind));
        }
        assert_eq!(MediaKind::from_codec_type(RTPCodecType::Unspecified), None);
    }
}
