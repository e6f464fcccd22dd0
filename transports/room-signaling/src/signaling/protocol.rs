//! Relay wire protocol types
//!
//! Inbound and outbound relay traffic is a stream of JSON objects of the form
//! `{"event": "<tag>", "data": {...}}`. Peer-to-peer signaling payloads ride
//! inside `message` events and are tagged by their `type` field, matching the
//! shape browsers produce for session descriptions and ICE candidates.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any string-like value
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the identifier is empty or whitespace
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Room identifier chosen by the host application
    RoomId
);

string_id!(
    /// Participant identifier assigned by the relay server
    ParticipantId
);

/// Kind of session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// Offer produced by the initiating side
    Offer,
    /// Answer produced in response to an offer
    Answer,
}

/// A session description produced or consumed by a transport engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Offer or answer
    #[serde(rename = "type")]
    pub kind: SdpKind,

    /// Opaque SDP body
    pub sdp: String,
}

impl SessionDescription {
    /// Build an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    /// Build an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate exchanged between engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate line
    pub candidate: String,

    /// Media stream identification tag
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sdp_mid: Option<String>,

    /// Index of the media line the candidate belongs to
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sdp_mline_index: Option<u16>,
}

/// Peer-to-peer signaling payload carried by relay `message` events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalMessage {
    /// Sender is leaving the call
    Leave,

    /// Sender has local media and is ready to connect
    #[serde(rename = "gotstream")]
    GotStream,

    /// SDP offer
    Offer {
        /// SDP body
        sdp: String,
    },

    /// SDP answer
    Answer {
        /// SDP body
        sdp: String,
    },

    /// Trickled ICE candidate
    Candidate {
        /// SDP media line index, null when the candidate has none
        #[serde(default)]
        label: Option<u16>,
        /// SDP media id
        #[serde(skip_serializing_if = "Option::is_none", default)]
        id: Option<String>,
        /// Candidate line
        candidate: String,
    },
}

impl SignalMessage {
    /// Wrap a local session description for relaying
    pub fn from_description(desc: SessionDescription) -> Self {
        match desc.kind {
            SdpKind::Offer => SignalMessage::Offer { sdp: desc.sdp },
            SdpKind::Answer => SignalMessage::Answer { sdp: desc.sdp },
        }
    }

    /// Wrap a locally gathered ICE candidate for relaying
    pub fn from_candidate(candidate: IceCandidate) -> Self {
        SignalMessage::Candidate {
            label: candidate.sdp_mline_index,
            id: candidate.sdp_mid,
            candidate: candidate.candidate,
        }
    }

    /// Message tag as it appears on the wire
    pub fn tag(&self) -> &'static str {
        match self {
            SignalMessage::Leave => "leave",
            SignalMessage::GotStream => "gotstream",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::Candidate { .. } => "candidate",
        }
    }
}

/// Event received from the relay server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum RelayEvent {
    /// The requested room did not exist and was created for us
    #[serde(rename = "created")]
    Created {
        /// Room id
        room: RoomId,
        /// Id assigned to the local participant
        participant: ParticipantId,
    },

    /// We joined an existing room
    #[serde(rename = "joined")]
    Joined {
        /// Room id
        room: RoomId,
        /// Id assigned to the local participant
        participant: ParticipantId,
    },

    /// Confirmation that we left a room
    #[serde(rename = "left room")]
    LeftRoom {
        /// Room id
        room: RoomId,
    },

    /// Another participant joined our room
    #[serde(rename = "join")]
    Join {
        /// Room id
        room: RoomId,
    },

    /// A participant is ready to establish connections
    #[serde(rename = "ready")]
    Ready {
        /// Participant id
        participant: ParticipantId,
    },

    /// A participant was kicked out of the room
    #[serde(rename = "kickout")]
    Kickout {
        /// Kicked participant id
        participant: ParticipantId,
    },

    /// Diagnostic output forwarded by the server
    #[serde(rename = "log")]
    Log {
        /// Opaque log arguments
        #[serde(default)]
        args: Vec<serde_json::Value>,
    },

    /// Signaling payload from another participant
    #[serde(rename = "message")]
    Message {
        /// Sender participant id
        from: ParticipantId,
        /// Payload
        message: SignalMessage,
    },
}

/// Request sent to the relay server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum RelayRequest {
    /// Join the room, creating it if it does not exist
    #[serde(rename = "create or join")]
    CreateOrJoin {
        /// Room id
        room: RoomId,
    },

    /// Leave the room
    #[serde(rename = "leave room")]
    LeaveRoom {
        /// Room id
        room: RoomId,
    },

    /// Forward a signaling payload
    #[serde(rename = "message")]
    Message {
        /// Payload
        message: SignalMessage,
        /// Target participant (None broadcasts)
        #[serde(skip_serializing_if = "Option::is_none", default)]
        to: Option<ParticipantId>,
        /// Room scope for broadcasts
        #[serde(skip_serializing_if = "Option::is_none", default)]
        room: Option<RoomId>,
    },

    /// Ask the server to remove a participant from the room
    #[serde(rename = "kickout")]
    Kickout {
        /// Participant to remove
        participant: ParticipantId,
        /// Room id
        room: RoomId,
    },
}

impl RelayEvent {
    /// Parse an event from JSON
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            crate::Error::SerializationError(format!("Failed to deserialize relay event: {}", e))
        })
    }

    /// Convert event to JSON string
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::Error::SerializationError(format!("Failed to serialize relay event: {}", e))
        })
    }
}

impl RelayRequest {
    /// Build a targeted signaling message
    pub fn message_to(to: ParticipantId, message: SignalMessage) -> Self {
        RelayRequest::Message {
            message,
            to: Some(to),
            room: None,
        }
    }

    /// Build a room-wide signaling broadcast
    pub fn broadcast(room: RoomId, message: SignalMessage) -> Self {
        RelayRequest::Message {
            message,
            to: None,
            room: Some(room),
        }
    }

    /// Convert request to JSON string
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::Error::SerializationError(format!("Failed to serialize relay request: {}", e))
        })
    }

    /// Parse a request from JSON
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            crate::Error::SerializationError(format!(
                "Failed to deserialize relay request: {}",
                e
            ))
        })
    }
}
