//! Host-facing coordinator events
//!
//! Every state change the host application may care about is reported as a
//! [`CoordinatorEvent`] through the [`EventStream`] returned when the
//! coordinator is spawned. Events arrive in the order the coordinator
//! produced them, each exactly once.

use crate::media::RemoteStream;
use crate::signaling::{ParticipantId, RoomId};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Precondition that caused a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Join requested while already in a room
    AlreadyInRoom,
    /// Join requested with an empty room id
    MissingRoomId,
    /// Leave requested while not in a room
    NotInRoom,
    /// Stream readiness signalled before joining a room
    JoinBeforeStream,
    /// Kick requested without admin rights
    NotAdmin,
}

/// Error categories reported through [`CoordinatorEvent::Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Local media acquisition failed
    Media,
    /// Transport engine construction or media attachment failed
    PeerConnection,
    /// Offer/answer creation or application failed
    Negotiation,
    /// ICE candidate could not be applied
    Candidate,
    /// Signaling message for a participant without a connection entry
    UnknownParticipant,
    /// Relay transport rejected a request
    Relay,
    /// Participant limit reached
    Capacity,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Media => write!(f, "MEDIA"),
            ErrorCode::PeerConnection => write!(f, "PEER_CONNECTION"),
            ErrorCode::Negotiation => write!(f, "NEGOTIATION"),
            ErrorCode::Candidate => write!(f, "CANDIDATE"),
            ErrorCode::UnknownParticipant => write!(f, "UNKNOWN_PARTICIPANT"),
            ErrorCode::Relay => write!(f, "RELAY"),
            ErrorCode::Capacity => write!(f, "CAPACITY"),
        }
    }
}

/// Non-fatal failure reported to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Related participant (optional)
    pub participant_id: Option<ParticipantId>,
}

impl ErrorEvent {
    /// Create a new error event
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            participant_id: None,
        }
    }

    /// Build an error event from a crate error
    pub fn from_error(code: ErrorCode, error: &Error) -> Self {
        Self::new(code, error.to_string())
    }

    /// Attach the participant the failure concerns
    pub fn with_participant(mut self, participant_id: ParticipantId) -> Self {
        self.participant_id = Some(participant_id);
        self
    }
}

/// Lifecycle event emitted by the coordinator
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// The relay created the requested room; we are its admin
    RoomCreated {
        /// Room id
        room_id: RoomId,
    },

    /// We joined an existing room
    RoomJoined {
        /// Room id
        room_id: RoomId,
    },

    /// The relay confirmed we left the room
    RoomLeft {
        /// Room id
        room_id: RoomId,
    },

    /// Someone joined the room; identity follows through signaling
    ParticipantArrived,

    /// We were kicked out of the room
    Kicked,

    /// A precondition failed and the operation was ignored
    Notification {
        /// Which precondition failed
        kind: NotificationKind,
        /// Localized text from the configuration
        message: String,
    },

    /// A failure that was contained by the coordinator
    Error(ErrorEvent),

    /// A participant's media stream arrived or changed
    ParticipantStream {
        /// Participant id
        participant_id: ParticipantId,
        /// Remote stream handle
        stream: RemoteStream,
    },

    /// A participant entry was removed; `None` means every entry
    ParticipantRemoved {
        /// Removed participant, or None after full teardown
        participant_id: Option<ParticipantId>,
    },

    /// A participant announced it is leaving the call
    ParticipantLeft {
        /// Participant id
        participant_id: ParticipantId,
    },
}

impl CoordinatorEvent {
    /// Get the event name for logging/debugging
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomCreated { .. } => "room_created",
            Self::RoomJoined { .. } => "room_joined",
            Self::RoomLeft { .. } => "room_left",
            Self::ParticipantArrived => "participant_arrived",
            Self::Kicked => "kicked",
            Self::Notification { .. } => "notification",
            Self::Error(_) => "error",
            Self::ParticipantStream { .. } => "participant_stream",
            Self::ParticipantRemoved { .. } => "participant_removed",
            Self::ParticipantLeft { .. } => "participant_left",
        }
    }
}

/// Receiving end of the coordinator's event channel
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
}

impl EventStream {
    /// Wait for the next event
    ///
    /// Returns `None` once the coordinator has stopped and every queued event
    /// has been consumed.
    pub async fn recv(&mut self) -> Option<CoordinatorEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<CoordinatorEvent> {
        self.rx.try_recv().ok()
    }
}

/// Sending end used by the coordinator
pub(crate) struct EventEmitter {
    tx: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl EventEmitter {
    pub(crate) fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, EventStream { rx })
    }

    pub(crate) fn emit(&self, event: CoordinatorEvent) {
        debug!("Emitting coordinator event: {}", event.name());
        // The host may have dropped its stream; events are then discarded.
        let _ = self.tx.send(event);
    }
}
