//! Coordinator Test Harness
//!
//! Provides infrastructure for integration testing of the coordinator with:
//! - Scripted transport engines that record every call
//! - An in-memory relay whose outbound requests can be inspected
//! - A media source that succeeds or fails on demand
//! - Event/request wait helpers bounded by timeouts
//!
//! Basic usage pattern:
//!
//! 1. Create a `TestRoom` with `TestRoom::start()`
//! 2. Drive it through `room.handle` and `room.deliver(...)`
//! 3. Assert on `room.next_event()` / `room.next_request()`
//! 4. Poke engines through `room.factory.engine(..)`

#![allow(dead_code)]

pub mod engine;

use room_signaling::{
    AudioConstraints, ChannelRelay, Coordinator, CoordinatorConfig, CoordinatorEvent,
    CoordinatorHandle, Error, EventStream, LocalMedia, MediaSource, ParticipantId, RelayEvent,
    RelayInbox, RelayRequest, Result, RoomId, SignalMessage, VideoConstraints,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub use engine::{EngineCall, Failures, MockEngine, MockEngineFactory};

/// How long to wait for an expected event or request
pub const WAIT: Duration = Duration::from_secs(2);

/// Install a test subscriber once; honours RUST_LOG
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Media source that hands out empty media, or fails when told to
#[derive(Default)]
pub struct MockMediaSource {
    pub fail: bool,
}

#[async_trait::async_trait]
impl MediaSource for MockMediaSource {
    async fn acquire(
        &self,
        _audio: &AudioConstraints,
        _video: &VideoConstraints,
    ) -> Result<LocalMedia> {
        if self.fail {
            return Err(Error::MediaError("permission denied".to_string()));
        }
        Ok(LocalMedia::new("local-stream"))
    }
}

/// A running coordinator wired to mocks
pub struct TestRoom {
    pub handle: CoordinatorHandle,
    pub events: EventStream,
    pub requests: mpsc::UnboundedReceiver<RelayRequest>,
    pub factory: Arc<MockEngineFactory>,
    pub inbox: RelayInbox,
    pub task: JoinHandle<()>,
}

impl TestRoom {
    /// Start with default configuration and working media
    pub fn start() -> Self {
        Self::start_with(CoordinatorConfig::default(), MockMediaSource::default())
    }

    /// Start with explicit configuration and media source
    pub fn start_with(config: CoordinatorConfig, media: MockMediaSource) -> Self {
        init_logging();

        let (relay, requests) = ChannelRelay::new();
        let factory = Arc::new(MockEngineFactory::default());
        let (handle, events, task) = Coordinator::spawn(
            config,
            Arc::new(relay),
            Arc::clone(&factory) as Arc<dyn room_signaling::EngineFactory>,
            Arc::new(media),
        )
        .expect("coordinator should start");
        let inbox = handle.relay_inbox();

        Self {
            handle,
            events,
            requests,
            factory,
            inbox,
            task,
        }
    }

    /// Deliver a relay event
    pub fn deliver(&self, event: RelayEvent) {
        self.inbox.deliver(event).expect("coordinator running");
    }

    /// Deliver a signaling message from `from`
    pub fn message(&self, from: &str, message: SignalMessage) {
        self.deliver(RelayEvent::Message {
            from: ParticipantId::new(from),
            message,
        });
    }

    /// Wait until every input queued so far has been processed
    pub async fn settle(&self) {
        self.handle.session().await.expect("coordinator running");
    }

    /// Next event, failing the test after a timeout
    pub async fn next_event(&mut self) -> CoordinatorEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for coordinator event")
            .expect("event stream closed")
    }

    /// Every event emitted up to now
    pub async fn drain_events(&mut self) -> Vec<CoordinatorEvent> {
        self.settle().await;
        let mut events = Vec::new();
        while let Some(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Assert nothing was emitted up to now
    pub async fn assert_no_events(&mut self) {
        let events = self.drain_events().await;
        assert!(events.is_empty(), "unexpected events: {:?}", events);
    }

    /// Next outbound relay request, failing the test after a timeout
    pub async fn next_request(&mut self) -> RelayRequest {
        timeout(WAIT, self.requests.recv())
            .await
            .expect("timed out waiting for relay request")
            .expect("relay channel closed")
    }

    /// Every relay request sent up to now
    pub async fn drain_requests(&mut self) -> Vec<RelayRequest> {
        self.settle().await;
        let mut requests = Vec::new();
        while let Ok(request) = self.requests.try_recv() {
            requests.push(request);
        }
        requests
    }

    /// Assert nothing was sent to the relay up to now
    pub async fn assert_no_requests(&mut self) {
        let requests = self.drain_requests().await;
        assert!(requests.is_empty(), "unexpected relay requests: {:?}", requests);
    }

    /// Acquire media through the coordinator
    pub async fn acquire_media(&self) -> LocalMedia {
        self.handle
            .acquire_local_media(AudioConstraints::default(), VideoConstraints::default())
            .await
            .expect("media acquisition should succeed")
    }

    /// Create `room` as participant `me` and consume the resulting traffic
    pub async fn create_room(&mut self, room: &str, me: &str) {
        self.handle.join_room(room).unwrap();
        assert_eq!(
            self.next_request().await,
            RelayRequest::CreateOrJoin {
                room: RoomId::new(room)
            }
        );
        self.deliver(RelayEvent::Created {
            room: RoomId::new(room),
            participant: ParticipantId::new(me),
        });
        assert!(matches!(
            self.next_event().await,
            CoordinatorEvent::RoomCreated { .. }
        ));
    }

    /// Join existing `room` as participant `me` and consume the resulting traffic
    pub async fn join_existing_room(&mut self, room: &str, me: &str) {
        self.handle.join_room(room).unwrap();
        self.next_request().await;
        self.deliver(RelayEvent::Joined {
            room: RoomId::new(room),
            participant: ParticipantId::new(me),
        });
        assert!(matches!(
            self.next_event().await,
            CoordinatorEvent::RoomJoined { .. }
        ));
    }

    /// Another participant arrives in `room`
    pub async fn participant_arrives(&mut self, room: &str) {
        self.deliver(RelayEvent::Join {
            room: RoomId::new(room),
        });
        assert!(matches!(
            self.next_event().await,
            CoordinatorEvent::ParticipantArrived
        ));
    }

    /// Admin with media in `room`, with a second participant present
    pub async fn ready_initiator(&mut self, room: &str, me: &str) {
        self.acquire_media().await;
        self.create_room(room, me).await;
        self.participant_arrives(room).await;
    }

    /// Non-admin responder with media in `room`
    pub async fn ready_responder(&mut self, room: &str, me: &str) {
        self.acquire_media().await;
        self.join_existing_room(room, me).await;
    }
}

/// Relay message addressed to `to`
pub fn message_to(to: &str, message: SignalMessage) -> RelayRequest {
    RelayRequest::message_to(ParticipantId::new(to), message)
}
