//! Session state: room membership, role and capabilities

use crate::media::LocalMedia;
use crate::signaling::{ParticipantId, RoomId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Room membership as confirmed by the relay
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Membership {
    /// Not in any room
    #[default]
    Outside,
    /// Confirmed member of a room
    Member {
        /// Current room
        room_id: RoomId,
        /// Id the relay assigned to us for this membership
        participant_id: ParticipantId,
    },
}

/// Which side of the offer/answer exchange this session takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Waits for offers and answers them
    #[default]
    Responder,
    /// Sends the initial offer to new participants
    Initiator,
}

/// Capability flags layered on top of the role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Created the room; may kick participants. Never transferred.
    pub admin: bool,
    /// Another participant is present, connections may be attempted
    pub ready: bool,
    /// At least one remote ICE candidate has been received
    pub in_call: bool,
}

/// Explicit session state owned by the coordinator
#[derive(Debug, Clone, Default)]
pub struct Session {
    membership: Membership,
    role: Role,
    capabilities: Capabilities,
    local_media: Option<LocalMedia>,
}

impl Session {
    /// Create a session outside of any room
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a session from explicit parts
    ///
    /// # Errors
    ///
    /// Rejects admin rights without room membership: only the creator of the
    /// current room can be admin.
    pub fn from_parts(
        membership: Membership,
        role: Role,
        capabilities: Capabilities,
    ) -> Result<Self> {
        if capabilities.admin && membership == Membership::Outside {
            return Err(Error::InvalidConfig(
                "admin capability requires room membership".to_string(),
            ));
        }

        Ok(Self {
            membership,
            role,
            capabilities,
            local_media: None,
        })
    }

    /// Current room id, set only while a confirmed member
    pub fn room_id(&self) -> Option<&RoomId> {
        match &self.membership {
            Membership::Member { room_id, .. } => Some(room_id),
            Membership::Outside => None,
        }
    }

    /// Id assigned to us by the relay for the current membership
    pub fn local_participant_id(&self) -> Option<&ParticipantId> {
        match &self.membership {
            Membership::Member { participant_id, .. } => Some(participant_id),
            Membership::Outside => None,
        }
    }

    /// Room membership
    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    /// Current role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Capability flags
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// True while this session sends the initial offers
    pub fn is_initiator(&self) -> bool {
        self.role == Role::Initiator
    }

    /// True when this session created the current room
    pub fn is_admin(&self) -> bool {
        self.capabilities.admin
    }

    /// True once another participant is present
    pub fn is_ready(&self) -> bool {
        self.capabilities.ready
    }

    /// True once a remote ICE candidate was received
    pub fn in_call(&self) -> bool {
        self.capabilities.in_call
    }

    /// Locally acquired media
    pub fn local_media(&self) -> Option<&LocalMedia> {
        self.local_media.as_ref()
    }

    /// Record locally acquired media
    pub fn set_local_media(&mut self, media: LocalMedia) {
        self.local_media = Some(media);
    }

    /// Local media to connect with, once the room is ready
    pub fn media_for_connect(&self) -> Option<&LocalMedia> {
        if self.capabilities.ready {
            self.local_media.as_ref()
        } else {
            None
        }
    }

    /// The relay created the room for us
    pub fn room_created(&mut self, room_id: RoomId, participant_id: ParticipantId) {
        info!("Created room {} as {}", room_id, participant_id);
        self.membership = Membership::Member {
            room_id,
            participant_id,
        };
        self.role = Role::Initiator;
        self.capabilities.admin = true;
    }

    /// We joined an existing room, which already has occupants
    pub fn room_joined(&mut self, room_id: RoomId, participant_id: ParticipantId) {
        info!("Joined room {} as {}", room_id, participant_id);
        self.membership = Membership::Member {
            room_id,
            participant_id,
        };
        self.capabilities.ready = true;
    }

    /// Another participant joined our room
    pub fn participant_joined(&mut self) {
        self.capabilities.ready = true;
    }

    /// A leave request is about to be sent
    pub fn begin_leave(&mut self) {
        self.role = Role::Responder;
    }

    /// Take over the initiator role
    pub fn promote_to_initiator(&mut self) {
        if self.role != Role::Initiator {
            debug!("Promoting session to initiator");
        }
        self.role = Role::Initiator;
    }

    /// A remote ICE candidate arrived
    pub fn mark_in_call(&mut self) {
        self.capabilities.in_call = true;
    }

    /// Another participant reported ready
    ///
    /// Takes over the initiator role when the participant is not us and we
    /// are already in a call. Returns whether the role changed.
    pub fn participant_ready(&mut self, participant_id: &ParticipantId) -> bool {
        let is_self = self.local_participant_id() == Some(participant_id);
        if !is_self && self.capabilities.in_call && self.role != Role::Initiator {
            self.role = Role::Initiator;
            return true;
        }
        false
    }

    /// Drop room membership and every role flag
    ///
    /// Local media survives so it can be reused in the next room.
    pub fn reset_membership(&mut self) {
        self.membership = Membership::Outside;
        self.role = Role::Responder;
        self.capabilities = Capabilities::default();
    }
}
