//! Coordinator task: room lifecycle, connection bookkeeping and signaling
//! dispatch

use super::{Command, Completion, CoordinatorHandle, Input};
use crate::config::CoordinatorConfig;
use crate::events::{
    CoordinatorEvent, ErrorCode, ErrorEvent, EventEmitter, EventStream, NotificationKind,
};
use crate::media::{LocalMedia, MediaSource};
use crate::peer::{
    EngineEvent, EngineEventSink, EngineFactory, EngineNotice, PeerEntry, PeerRegistry,
    TransportEngine,
};
use crate::session::Session;
use crate::signaling::{
    IceCandidate, ParticipantId, RelayEvent, RelayRequest, RelayTransport, RoomId, SdpKind,
    SessionDescription, SignalMessage,
};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Outcome of a connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connect {
    /// An entry exists for the participant (new or pre-existing)
    Ready,
    /// Local media or room readiness is missing
    Skipped,
    /// Failure already reported as an error event
    Failed,
}

/// The coordinator state machine
///
/// Owns the session and every participant entry. Built with
/// [`Coordinator::new`] and driven by [`Coordinator::run`], or both at once
/// with [`Coordinator::spawn`].
pub struct Coordinator {
    config: CoordinatorConfig,
    session: Session,
    registry: PeerRegistry,
    factory: Arc<dyn EngineFactory>,
    media: Arc<dyn MediaSource>,
    events: EventEmitter,
    inbox: mpsc::UnboundedReceiver<Input>,
    loopback: mpsc::WeakUnboundedSender<Input>,
}

impl Coordinator {
    /// Create a coordinator together with its handle and event stream
    ///
    /// The handle accepts commands right away; they are processed once
    /// [`run`](Self::run) starts. Create the relay transport in between when
    /// it needs the handle's [`RelayInbox`](super::RelayInbox).
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(
        config: CoordinatorConfig,
        factory: Arc<dyn EngineFactory>,
        media: Arc<dyn MediaSource>,
    ) -> Result<(Self, CoordinatorHandle, EventStream)> {
        config.validate()?;

        let registry = PeerRegistry::new(config.max_participants)?;
        let (tx, inbox) = mpsc::unbounded_channel();
        let (events, stream) = EventEmitter::channel();

        let coordinator = Self {
            config,
            session: Session::new(),
            registry,
            factory,
            media,
            events,
            inbox,
            loopback: tx.downgrade(),
        };

        Ok((coordinator, CoordinatorHandle::new(tx), stream))
    }

    /// Create a coordinator and run it on a new task
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn spawn(
        config: CoordinatorConfig,
        relay: Arc<dyn RelayTransport>,
        factory: Arc<dyn EngineFactory>,
        media: Arc<dyn MediaSource>,
    ) -> Result<(CoordinatorHandle, EventStream, JoinHandle<()>)> {
        let (coordinator, handle, events) = Self::new(config, factory, media)?;
        let task = tokio::spawn(coordinator.run(relay));
        Ok((handle, events, task))
    }

    /// Process inputs until shutdown or until every handle and relay inbox
    /// is dropped
    pub async fn run(mut self, relay: Arc<dyn RelayTransport>) {
        info!("Signaling coordinator started");

        while let Some(input) = self.inbox.recv().await {
            match input {
                Input::Command(Command::Shutdown(reply)) => {
                    self.close_all().await;
                    let _ = reply.send(());
                    info!("Signaling coordinator shut down");
                    return;
                }
                Input::Command(command) => self.handle_command(command, relay.as_ref()).await,
                Input::Relay(event) => self.handle_relay_event(event, relay.as_ref()).await,
                Input::Engine(notice) => self.handle_engine_notice(notice, relay.as_ref()),
                Input::Completed(completion) => self.handle_completion(completion, relay.as_ref()),
            }
        }

        self.close_all().await;
        info!("Signaling coordinator stopped: all handles dropped");
    }

    async fn handle_command(&mut self, command: Command, relay: &dyn RelayTransport) {
        match command {
            Command::JoinRoom(room_id) => self.join_room(room_id, relay),
            Command::LeaveRoom => self.leave_room(relay),
            Command::AcquireLocalMedia {
                audio,
                video,
                reply,
            } => {
                let media = Arc::clone(&self.media);
                let loopback = self.loopback.clone();
                tokio::spawn(async move {
                    let result = media.acquire(&audio, &video).await;
                    post(&loopback, Completion::LocalMedia { result, reply });
                });
            }
            Command::SignalStreamReady => self.signal_stream_ready(relay),
            Command::KickParticipant(participant_id) => {
                self.kick_participant(participant_id, relay).await
            }
            Command::Connect(participant_id) => {
                self.attempt_connect(&participant_id).await;
            }
            Command::RemoveParticipant(participant_id) => {
                self.remove_participant(participant_id).await
            }
            Command::Session(reply) => {
                let _ = reply.send(self.session.clone());
            }
            Command::Participants(reply) => {
                let _ = reply.send(self.registry.participant_ids());
            }
            Command::Peers(reply) => {
                let _ = reply.send(self.registry.list());
            }
            Command::Streams(reply) => {
                let _ = reply.send(self.registry.streams());
            }
            // Handled by the run loop
            Command::Shutdown(reply) => {
                let _ = reply.send(());
            }
        }
    }

    // ---- Room lifecycle ----

    fn join_room(&mut self, room_id: RoomId, relay: &dyn RelayTransport) {
        if self.session.room_id().is_some() {
            self.notify(NotificationKind::AlreadyInRoom);
            return;
        }
        if room_id.is_blank() {
            self.notify(NotificationKind::MissingRoomId);
            return;
        }

        info!("Requesting to create or join room {}", room_id);
        self.send(relay, RelayRequest::CreateOrJoin { room: room_id });
    }

    fn leave_room(&mut self, relay: &dyn RelayTransport) {
        let Some(room_id) = self.session.room_id().cloned() else {
            self.notify(NotificationKind::NotInRoom);
            return;
        };

        info!("Requesting to leave room {}", room_id);
        self.session.begin_leave();
        self.send(relay, RelayRequest::LeaveRoom { room: room_id });
    }

    fn signal_stream_ready(&mut self, relay: &dyn RelayTransport) {
        let Some(room_id) = self.session.room_id().cloned() else {
            self.notify(NotificationKind::JoinBeforeStream);
            return;
        };

        self.send(relay, RelayRequest::broadcast(room_id, SignalMessage::GotStream));
    }

    async fn kick_participant(
        &mut self,
        participant_id: ParticipantId,
        relay: &dyn RelayTransport,
    ) {
        if !self.session.is_admin() {
            self.notify(NotificationKind::NotAdmin);
            return;
        }
        let Some(room_id) = self.session.room_id().cloned() else {
            self.notify(NotificationKind::NotInRoom);
            return;
        };

        info!("Kicking participant {} from room {}", participant_id, room_id);
        self.remove_participant(Some(participant_id.clone())).await;
        self.send(
            relay,
            RelayRequest::Kickout {
                participant: participant_id,
                room: room_id,
            },
        );
    }

    async fn handle_relay_event(&mut self, event: RelayEvent, relay: &dyn RelayTransport) {
        match event {
            RelayEvent::Created { room, participant } => {
                self.session.room_created(room.clone(), participant);
                self.events.emit(CoordinatorEvent::RoomCreated { room_id: room });
            }
            RelayEvent::Joined { room, participant } => {
                self.session.room_joined(room.clone(), participant);
                self.events.emit(CoordinatorEvent::RoomJoined { room_id: room });
            }
            RelayEvent::LeftRoom { room } => {
                if self.session.room_id() != Some(&room) {
                    debug!("Ignoring departure from room {} we are not in", room);
                    return;
                }
                info!("Left room {}", room);
                self.remove_participant(None).await;
                self.session.reset_membership();
                self.events.emit(CoordinatorEvent::RoomLeft { room_id: room });
            }
            RelayEvent::Join { room } => {
                debug!("Participant arrived in room {}", room);
                self.session.participant_joined();
                self.events.emit(CoordinatorEvent::ParticipantArrived);
            }
            RelayEvent::Ready { participant } => {
                debug!("Participant {} is ready", participant);
                // Not coordinated with other clients: concurrent joins may
                // leave more than one initiator in the room.
                if self.session.participant_ready(&participant) {
                    info!("Took over initiator role after {} became ready", participant);
                }
            }
            RelayEvent::Kickout { participant } => {
                if self.session.local_participant_id() == Some(&participant) {
                    warn!("Kicked out of room");
                    self.events.emit(CoordinatorEvent::Kicked);
                    self.remove_participant(None).await;
                    self.session.reset_membership();
                } else {
                    self.remove_participant(Some(participant)).await;
                }
            }
            RelayEvent::Log { args } => {
                let line = args
                    .iter()
                    .map(|arg| match arg {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                if self.config.logging.relay_logs {
                    info!(target: "room_signaling::relay", "{}", line);
                } else {
                    trace!("Dropped relay log: {}", line);
                }
            }
            RelayEvent::Message { from, message } => {
                self.handle_message(from, message, relay).await
            }
        }
    }

    // ---- Signaling dispatch ----

    #[instrument(skip(self, message, relay), fields(kind = message.tag()))]
    async fn handle_message(
        &mut self,
        from: ParticipantId,
        message: SignalMessage,
        relay: &dyn RelayTransport,
    ) {
        match message {
            SignalMessage::Leave => {
                info!("Participant {} left the call", from);
                self.remove_participant(Some(from.clone())).await;
                self.session.promote_to_initiator();
                self.events.emit(CoordinatorEvent::ParticipantLeft {
                    participant_id: from,
                });
            }
            // Connected peers need no further negotiation
            _ if self.registry.get(&from).is_some_and(PeerEntry::is_connected) => {
                debug!("Ignoring {} from already connected {}", message.tag(), from);
            }
            SignalMessage::GotStream => {
                self.attempt_connect(&from).await;
            }
            SignalMessage::Offer { sdp } => {
                if !self.registry.contains(&from) {
                    match self.attempt_connect(&from).await {
                        Connect::Ready => {}
                        Connect::Failed => return,
                        Connect::Skipped => {
                            self.report(
                                ErrorCode::UnknownParticipant,
                                &Error::UnknownParticipant(format!(
                                    "offer from {} arrived before local media and room were ready",
                                    from
                                )),
                                Some(&from),
                            );
                            return;
                        }
                    }
                }
                self.answer(from, SessionDescription::offer(sdp)).await;
            }
            SignalMessage::Answer { sdp } => {
                let Some(engine) = self.engine_for(&from, "answer") else {
                    return;
                };
                if let Err(e) = engine
                    .set_remote_description(SessionDescription::answer(sdp))
                    .await
                {
                    self.report(ErrorCode::Negotiation, &e, Some(&from));
                }
            }
            SignalMessage::Candidate {
                label, candidate, ..
            } => {
                self.session.mark_in_call();
                let Some(engine) = self.engine_for(&from, "candidate") else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate,
                    sdp_mid: None,
                    sdp_mline_index: label,
                };
                if let Err(e) = engine.add_ice_candidate(candidate).await {
                    self.report(ErrorCode::Candidate, &e, Some(&from));
                }
            }
        }
    }

    fn engine_for(
        &self,
        participant_id: &ParticipantId,
        kind: &str,
    ) -> Option<Arc<dyn TransportEngine>> {
        match self.registry.get(participant_id) {
            Some(entry) => Some(Arc::clone(entry.engine())),
            None => {
                self.report(
                    ErrorCode::UnknownParticipant,
                    &Error::UnknownParticipant(format!(
                        "received {} from {} without a connection",
                        kind, participant_id
                    )),
                    Some(participant_id),
                );
                None
            }
        }
    }

    // ---- Connection establishment ----

    #[instrument(skip(self, participant_id), fields(participant = %participant_id))]
    async fn attempt_connect(&mut self, participant_id: &ParticipantId) -> Connect {
        let Some(media) = self.session.media_for_connect().cloned() else {
            debug!(
                has_media = self.session.local_media().is_some(),
                ready = self.session.is_ready(),
                "Not connecting yet"
            );
            return Connect::Skipped;
        };
        if self.registry.contains(participant_id) {
            debug!("Connection entry already exists");
            return Connect::Ready;
        }
        if !self.registry.has_capacity() {
            self.report(
                ErrorCode::Capacity,
                &Error::CapacityExceeded(self.config.max_participants),
                Some(participant_id),
            );
            return Connect::Failed;
        }

        let entry = match self.create_entry(participant_id, &media).await {
            Ok(entry) => entry,
            Err(e) => {
                self.report(ErrorCode::PeerConnection, &e, Some(participant_id));
                return Connect::Failed;
            }
        };

        let generation = entry.generation();
        let engine = Arc::clone(entry.engine());
        if let Err(e) = self.registry.insert(entry) {
            self.report(ErrorCode::PeerConnection, &e, Some(participant_id));
            return Connect::Failed;
        }

        if self.session.is_initiator() {
            info!("Sending offer to {}", participant_id);
            let participant_id = participant_id.clone();
            let loopback = self.loopback.clone();
            tokio::spawn(async move {
                let result = negotiate(engine, SdpKind::Offer).await;
                post(
                    &loopback,
                    Completion::LocalDescription {
                        participant_id,
                        generation,
                        result,
                    },
                );
            });
        }

        Connect::Ready
    }

    async fn create_entry(
        &mut self,
        participant_id: &ParticipantId,
        media: &LocalMedia,
    ) -> Result<PeerEntry> {
        let generation = self.registry.next_generation();
        let loopback = self.loopback.clone();
        let sink = EngineEventSink::new(participant_id.clone(), generation, move |notice| {
            post_input(&loopback, Input::Engine(notice));
        });

        let engine = self.factory.create_engine(participant_id, sink).await?;
        if let Err(e) = engine.attach_local_media(media).await {
            if let Err(close_err) = engine.close().await {
                warn!("Error closing rejected engine for {}: {}", participant_id, close_err);
            }
            return Err(Error::PeerConnectionError(format!(
                "Failed to attach local media: {}",
                e
            )));
        }

        Ok(PeerEntry::new(participant_id.clone(), generation, engine))
    }

    async fn answer(&mut self, participant_id: ParticipantId, offer: SessionDescription) {
        let Some(entry) = self.registry.get(&participant_id) else {
            return;
        };
        let engine = Arc::clone(entry.engine());
        let generation = entry.generation();

        if let Err(e) = engine.set_remote_description(offer).await {
            self.report(ErrorCode::Negotiation, &e, Some(&participant_id));
            return;
        }

        debug!("Answering offer from {}", participant_id);
        let loopback = self.loopback.clone();
        tokio::spawn(async move {
            let result = negotiate(engine, SdpKind::Answer).await;
            post(
                &loopback,
                Completion::LocalDescription {
                    participant_id,
                    generation,
                    result,
                },
            );
        });
    }

    fn handle_completion(&mut self, completion: Completion, relay: &dyn RelayTransport) {
        match completion {
            Completion::LocalDescription {
                participant_id,
                generation,
                result,
            } => {
                if self
                    .registry
                    .get_current_mut(&participant_id, generation)
                    .is_none()
                {
                    debug!(
                        "Discarding local description for replaced or removed {}",
                        participant_id
                    );
                    return;
                }
                match result {
                    Ok(description) => self.send(
                        relay,
                        RelayRequest::message_to(
                            participant_id,
                            SignalMessage::from_description(description),
                        ),
                    ),
                    Err(e) => self.report(ErrorCode::Negotiation, &e, Some(&participant_id)),
                }
            }
            Completion::LocalMedia { result, reply } => {
                match &result {
                    Ok(media) => {
                        info!("Local media acquired: {:?}", media);
                        self.session.set_local_media(media.clone());
                    }
                    Err(e) => self.report(ErrorCode::Media, e, None),
                }
                let _ = reply.send(result);
            }
        }
    }

    // ---- Engine callbacks ----

    fn handle_engine_notice(&mut self, notice: EngineNotice, relay: &dyn RelayTransport) {
        let EngineNotice {
            participant_id,
            generation,
            event,
        } = notice;

        let Some(entry) = self.registry.get_current_mut(&participant_id, generation) else {
            trace!("Dropping engine notice for stale entry {}", participant_id);
            return;
        };

        match event {
            EngineEvent::IceCandidate(Some(candidate)) => self.send(
                relay,
                RelayRequest::message_to(participant_id, SignalMessage::from_candidate(candidate)),
            ),
            EngineEvent::IceCandidate(None) => {
                debug!("ICE gathering complete for {}", participant_id);
            }
            EngineEvent::Track(stream) => {
                if entry.record_stream(stream.clone()) {
                    info!("New stream {} from {}", stream.id(), participant_id);
                    self.events.emit(CoordinatorEvent::ParticipantStream {
                        participant_id,
                        stream,
                    });
                }
            }
            EngineEvent::StateChanged(state) => {
                debug!("Connection to {} is now {:?}", participant_id, state);
            }
        }
    }

    // ---- Removal ----

    async fn remove_participant(&mut self, participant_id: Option<ParticipantId>) {
        match &participant_id {
            None => {
                for entry in self.registry.drain() {
                    entry.close().await;
                }
            }
            Some(id) => {
                if let Some(entry) = self.registry.remove(id) {
                    entry.close().await;
                }
            }
        }
        self.events
            .emit(CoordinatorEvent::ParticipantRemoved { participant_id });
    }

    async fn close_all(&mut self) {
        for entry in self.registry.drain() {
            entry.close().await;
        }
    }

    // ---- Outputs ----

    fn send(&self, relay: &dyn RelayTransport, request: RelayRequest) {
        if let Err(e) = relay.send(request) {
            self.report(ErrorCode::Relay, &e, None);
        }
    }

    fn notify(&self, kind: NotificationKind) {
        let texts = &self.config.notifications;
        let message = match kind {
            NotificationKind::AlreadyInRoom => &texts.already_in_room,
            NotificationKind::MissingRoomId => &texts.missing_room_id,
            NotificationKind::NotInRoom => &texts.not_in_room,
            NotificationKind::JoinBeforeStream => &texts.join_before_stream,
            NotificationKind::NotAdmin => &texts.not_admin,
        };
        debug!("Notification {:?}: {}", kind, message);
        self.events.emit(CoordinatorEvent::Notification {
            kind,
            message: message.clone(),
        });
    }

    fn report(&self, code: ErrorCode, error: &Error, participant_id: Option<&ParticipantId>) {
        warn!("{} error: {}", code, error);
        let mut event = ErrorEvent::from_error(code, error);
        if let Some(id) = participant_id {
            event = event.with_participant(id.clone());
        }
        self.events.emit(CoordinatorEvent::Error(event));
    }
}

/// Create a local description of the given kind and apply it
async fn negotiate(engine: Arc<dyn TransportEngine>, kind: SdpKind) -> Result<SessionDescription> {
    let description = match kind {
        SdpKind::Offer => engine.create_offer().await?,
        SdpKind::Answer => engine.create_answer().await?,
    };
    engine.set_local_description(description.clone()).await?;
    Ok(description)
}

fn post(loopback: &mpsc::WeakUnboundedSender<Input>, completion: Completion) {
    post_input(loopback, Input::Completed(completion));
}

fn post_input(loopback: &mpsc::WeakUnboundedSender<Input>, input: Input) {
    match loopback.upgrade() {
        Some(tx) => {
            if tx.send(input).is_err() {
                trace!("Coordinator stopped; dropping input");
            }
        }
        None => trace!("Coordinator stopped; dropping input"),
    }
}
