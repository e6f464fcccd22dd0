//! Signaling coordinator
//!
//! The coordinator is a single task that owns the session, the participant
//! registry and every transport engine. All work reaches it through one FIFO
//! inbox:
//!
//! - host commands sent by a [`CoordinatorHandle`]
//! - relay events pushed through a [`RelayInbox`]
//! - engine notifications (ICE candidates, tracks, state changes)
//! - completions of offer/answer and media acquisition work running in
//!   spawned tasks
//!
//! Inputs are processed one at a time, so state never needs locking.
//! Completions and engine notifications carry the generation of the entry
//! they were started for and are dropped when that entry is gone.

mod actor;
mod handle;

pub use actor::Coordinator;
pub use handle::CoordinatorHandle;

use crate::media::{AudioConstraints, LocalMedia, RemoteStream, VideoConstraints};
use crate::peer::{EngineNotice, PeerInfo};
use crate::session::Session;
use crate::signaling::{ParticipantId, RelayEvent, RoomId, SessionDescription};
use crate::{Error, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Everything the coordinator task reacts to
pub(crate) enum Input {
    Command(Command),
    Relay(RelayEvent),
    Engine(EngineNotice),
    Completed(Completion),
}

/// Host requests
pub(crate) enum Command {
    JoinRoom(RoomId),
    LeaveRoom,
    AcquireLocalMedia {
        audio: AudioConstraints,
        video: VideoConstraints,
        reply: oneshot::Sender<Result<LocalMedia>>,
    },
    SignalStreamReady,
    KickParticipant(ParticipantId),
    Connect(ParticipantId),
    RemoveParticipant(Option<ParticipantId>),
    Session(oneshot::Sender<Session>),
    Participants(oneshot::Sender<Vec<ParticipantId>>),
    Peers(oneshot::Sender<Vec<PeerInfo>>),
    Streams(oneshot::Sender<Vec<(ParticipantId, RemoteStream)>>),
    Shutdown(oneshot::Sender<()>),
}

/// Results of work that ran outside the coordinator task
pub(crate) enum Completion {
    /// Local description created and applied; ready to relay
    LocalDescription {
        participant_id: ParticipantId,
        generation: u64,
        result: Result<SessionDescription>,
    },
    /// Local media acquisition finished
    LocalMedia {
        result: Result<LocalMedia>,
        reply: oneshot::Sender<Result<LocalMedia>>,
    },
}

/// Entry point for inbound relay events
///
/// Relay transports hold one of these and deliver every event they receive.
/// Delivery order is processing order.
#[derive(Clone)]
pub struct RelayInbox {
    tx: mpsc::UnboundedSender<Input>,
}

impl RelayInbox {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Input>) -> Self {
        Self { tx }
    }

    /// Queue an inbound relay event for processing
    ///
    /// # Errors
    ///
    /// Returns [`Error::CoordinatorClosed`] once the coordinator has stopped.
    pub fn deliver(&self, event: RelayEvent) -> Result<()> {
        debug!("Delivering relay event: {:?}", event);
        self.tx
            .send(Input::Relay(event))
            .map_err(|_| Error::CoordinatorClosed)
    }
}
