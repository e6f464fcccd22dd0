//! Media handles and local media acquisition
//!
//! The coordinator never touches media samples. It only carries handles:
//! [`LocalMedia`] is attached to every new engine, [`RemoteStream`] is
//! reported by engines when a remote track arrives.

pub mod source;

pub use source::{AudioConstraints, MediaSource, SampleTrackSource, VideoCodec, VideoConstraints};

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Locally captured media, shared by every peer connection
#[derive(Clone)]
pub struct LocalMedia {
    id: String,
    tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
}

impl LocalMedia {
    /// Create an empty media handle
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Vec::new(),
        }
    }

    /// Add a local track
    pub fn with_track(mut self, track: Arc<dyn TrackLocal + Send + Sync>) -> Self {
        self.tracks.push(track);
        self
    }

    /// Stream id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Local tracks to attach to each engine
    pub fn tracks(&self) -> &[Arc<dyn TrackLocal + Send + Sync>] {
        &self.tracks
    }
}

impl fmt::Debug for LocalMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMedia")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

/// Track received from a remote participant
#[derive(Clone)]
pub struct RemoteTrack {
    id: String,
    kind: RTPCodecType,
    rtp: Option<Arc<TrackRemote>>,
}

impl RemoteTrack {
    /// Describe a track by id and kind
    pub fn new(id: impl Into<String>, kind: RTPCodecType) -> Self {
        Self {
            id: id.into(),
            kind,
            rtp: None,
        }
    }

    /// Wrap a track delivered by a webrtc peer connection
    pub fn from_rtp(track: Arc<TrackRemote>) -> Self {
        Self {
            id: track.id(),
            kind: track.kind(),
            rtp: Some(track),
        }
    }

    /// Track id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Audio or video
    pub fn kind(&self) -> RTPCodecType {
        self.kind
    }

    /// Underlying RTP track, when the engine exposes one
    pub fn rtp(&self) -> Option<&Arc<TrackRemote>> {
        self.rtp.as_ref()
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Media stream received from a remote participant
///
/// Clones share one track list, so a handle given to the host sees tracks
/// that arrive later on the same stream. Two handles describe the same
/// stream when their ids match.
#[derive(Clone)]
pub struct RemoteStream {
    id: String,
    tracks: Arc<Mutex<Vec<RemoteTrack>>>,
}

impl RemoteStream {
    /// Create a handle for the stream with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a received track
    pub fn with_track(self, track: RemoteTrack) -> Self {
        self.tracks.lock().push(track);
        self
    }

    /// Stream id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tracks received so far
    pub fn tracks(&self) -> Vec<RemoteTrack> {
        self.tracks.lock().clone()
    }

    /// Number of tracks received so far
    pub fn track_count(&self) -> usize {
        self.tracks.lock().len()
    }

    /// Stream identity comparison
    pub fn is_same_stream(&self, other: &RemoteStream) -> bool {
        self.id == other.id
    }

    /// Take over tracks of `other` that this stream does not have yet
    ///
    /// Returns the number of tracks added.
    pub fn merge(&self, other: &RemoteStream) -> usize {
        if Arc::ptr_eq(&self.tracks, &other.tracks) {
            return 0;
        }
        let incoming = other.tracks();
        let mut tracks = self.tracks.lock();
        let mut added = 0;
        for track in incoming {
            if !tracks.iter().any(|t| t.id == track.id) {
                tracks.push(track);
                added += 1;
            }
        }
        added
    }
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("id", &self.id)
            .field("tracks", &self.track_count())
            .finish()
    }
}
