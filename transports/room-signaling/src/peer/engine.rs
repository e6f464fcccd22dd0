//! Transport engine contract
//!
//! A transport engine performs the actual media negotiation for one remote
//! participant. The coordinator creates one per participant through an
//! [`EngineFactory`], drives it through the offer/answer exchange and reacts
//! to the notifications it pushes into its [`EngineEventSink`].

use crate::media::{LocalMedia, RemoteStream};
use crate::signaling::{IceCandidate, ParticipantId, SessionDescription};
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Peer connection state as reported by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, connection not yet started
    New,
    /// Connection negotiation in progress
    Connecting,
    /// Connection established successfully
    Connected,
    /// Connectivity lost, may recover
    Disconnected,
    /// Connection failed
    Failed,
    /// Connection closed
    Closed,
}

/// Notification pushed by an engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A local ICE candidate was gathered; `None` marks the end of gathering
    IceCandidate(Option<IceCandidate>),
    /// A remote track arrived on the given stream
    Track(RemoteStream),
    /// The connection state changed
    StateChanged(ConnectionState),
}

/// Engine notification tagged with the entry it belongs to
#[derive(Debug, Clone)]
pub struct EngineNotice {
    /// Remote participant the engine connects to
    pub participant_id: ParticipantId,
    /// Registry generation of the owning entry
    pub generation: u64,
    /// The notification
    pub event: EngineEvent,
}

type NoticeCallback = Arc<dyn Fn(EngineNotice) + Send + Sync>;

/// Channel through which an engine reports asynchronous notifications
///
/// Cheap to clone; engines typically move a clone into each callback they
/// register with the underlying connection.
#[derive(Clone)]
pub struct EngineEventSink {
    participant_id: ParticipantId,
    generation: u64,
    callback: NoticeCallback,
}

impl EngineEventSink {
    pub(crate) fn new<F>(participant_id: ParticipantId, generation: u64, callback: F) -> Self
    where
        F: Fn(EngineNotice) + Send + Sync + 'static,
    {
        Self {
            participant_id,
            generation,
            callback: Arc::new(callback),
        }
    }

    /// Remote participant this sink reports for
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Report a gathered local ICE candidate
    pub fn ice_candidate(&self, candidate: Option<IceCandidate>) {
        self.send(EngineEvent::IceCandidate(candidate));
    }

    /// Report an incoming remote track
    pub fn track(&self, stream: RemoteStream) {
        self.send(EngineEvent::Track(stream));
    }

    /// Report a connection state change
    pub fn state_changed(&self, state: ConnectionState) {
        self.send(EngineEvent::StateChanged(state));
    }

    fn send(&self, event: EngineEvent) {
        (self.callback)(EngineNotice {
            participant_id: self.participant_id.clone(),
            generation: self.generation,
            event,
        });
    }
}

impl fmt::Debug for EngineEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEventSink")
            .field("participant_id", &self.participant_id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// One peer connection to a remote participant
#[async_trait]
pub trait TransportEngine: Send + Sync {
    /// Attach the local media tracks
    async fn attach_local_media(&self, media: &LocalMedia) -> Result<()>;

    /// Produce a local offer
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Produce an answer to the applied remote offer
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Apply a local description
    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    /// Apply a remote description
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Incorporate a remote ICE candidate
    ///
    /// Candidates may arrive before the remote description; engines buffer or
    /// tolerate them.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Current connection state
    fn connection_state(&self) -> ConnectionState;

    /// Close the connection and release its resources
    async fn close(&self) -> Result<()>;
}

/// Creates transport engines, one per remote participant
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Create an engine for `participant_id` reporting into `events`
    async fn create_engine(
        &self,
        participant_id: &ParticipantId,
        events: EngineEventSink,
    ) -> Result<Arc<dyn TransportEngine>>;
}
