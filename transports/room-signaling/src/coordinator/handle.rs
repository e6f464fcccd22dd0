//! Cloneable front end of the coordinator task

use super::{Command, Input, RelayInbox};
use crate::media::{AudioConstraints, LocalMedia, RemoteStream, VideoConstraints};
use crate::peer::PeerInfo;
use crate::session::Session;
use crate::signaling::{ParticipantId, RoomId};
use crate::{Error, Result};
use tokio::sync::{mpsc, oneshot};

/// Host-side handle to a running coordinator
///
/// Operations are queued behind every input already delivered, so a query
/// issued after a relay event was delivered observes that event's effects.
/// Precondition failures are not returned here; they arrive as
/// [`CoordinatorEvent::Notification`](crate::CoordinatorEvent::Notification)
/// events. Methods only fail once the coordinator has stopped.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Input>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Input>) -> Self {
        Self { tx }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(Input::Command(command))
            .map_err(|_| Error::CoordinatorClosed)
    }

    async fn query<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply))?;
        rx.await.map_err(|_| Error::CoordinatorClosed)
    }

    /// Ask the relay to create or join `room_id`
    pub fn join_room(&self, room_id: impl Into<RoomId>) -> Result<()> {
        self.send(Command::JoinRoom(room_id.into()))
    }

    /// Ask the relay to take us out of the current room
    pub fn leave_room(&self) -> Result<()> {
        self.send(Command::LeaveRoom)
    }

    /// Acquire local media and keep it for every future connection
    ///
    /// # Errors
    ///
    /// Returns the acquisition failure, which is also reported as an error
    /// event.
    pub async fn acquire_local_media(
        &self,
        audio: AudioConstraints,
        video: VideoConstraints,
    ) -> Result<LocalMedia> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::AcquireLocalMedia { audio, video, reply })?;
        rx.await.map_err(|_| Error::CoordinatorClosed)?
    }

    /// Tell the room our media is ready
    pub fn signal_stream_ready(&self) -> Result<()> {
        self.send(Command::SignalStreamReady)
    }

    /// Remove a participant from the room (admin only)
    pub fn kick_participant(&self, participant_id: impl Into<ParticipantId>) -> Result<()> {
        self.send(Command::KickParticipant(participant_id.into()))
    }

    /// Try to establish a connection to a participant
    ///
    /// Silently does nothing until local media is acquired and the room is
    /// ready; call again once both hold.
    pub fn connect(&self, participant_id: impl Into<ParticipantId>) -> Result<()> {
        self.send(Command::Connect(participant_id.into()))
    }

    /// Close one participant's connection, or every connection for `None`
    pub fn remove_participant(&self, participant_id: Option<ParticipantId>) -> Result<()> {
        self.send(Command::RemoveParticipant(participant_id))
    }

    /// Snapshot of the session state
    pub async fn session(&self) -> Result<Session> {
        self.query(Command::Session).await
    }

    /// Locally acquired media, if any
    pub async fn local_media(&self) -> Result<Option<LocalMedia>> {
        Ok(self.session().await?.local_media().cloned())
    }

    /// Id the relay assigned to us in the current room
    pub async fn local_participant_id(&self) -> Result<Option<ParticipantId>> {
        Ok(self.session().await?.local_participant_id().cloned())
    }

    /// True when we created the current room
    pub async fn is_admin(&self) -> Result<bool> {
        Ok(self.session().await?.is_admin())
    }

    /// Current room
    pub async fn room_id(&self) -> Result<Option<RoomId>> {
        Ok(self.session().await?.room_id().cloned())
    }

    /// Participants that currently have a connection entry, sorted
    pub async fn participants(&self) -> Result<Vec<ParticipantId>> {
        self.query(Command::Participants).await
    }

    /// Per-participant connection details, sorted by participant id
    pub async fn peers(&self) -> Result<Vec<PeerInfo>> {
        self.query(Command::Peers).await
    }

    /// Remote streams received so far, sorted by participant id
    pub async fn remote_streams(&self) -> Result<Vec<(ParticipantId, RemoteStream)>> {
        self.query(Command::Streams).await
    }

    /// Inbox for a relay transport to deliver inbound events into
    pub fn relay_inbox(&self) -> RelayInbox {
        RelayInbox::new(self.tx.clone())
    }

    /// Close every connection and stop the coordinator
    ///
    /// Inputs queued before the shutdown are processed first.
    pub async fn shutdown(&self) -> Result<()> {
        self.query(Command::Shutdown).await
    }

    /// True once the coordinator task has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
