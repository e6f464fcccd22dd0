//! Scripted transport engines

use async_trait::async_trait;
use parking_lot::Mutex;
use room_signaling::{
    ConnectionState, EngineEventSink, EngineFactory, Error, IceCandidate, LocalMedia,
    ParticipantId, Result, SdpKind, SessionDescription, TransportEngine,
};
use std::sync::Arc;
use tokio::sync::Notify;

/// Calls recorded by a [`MockEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    AttachLocalMedia(String),
    CreateOffer,
    CreateAnswer,
    SetLocalDescription(SdpKind),
    SetRemoteDescription(SessionDescription),
    AddIceCandidate(IceCandidate),
    Close,
}

/// Operations a mock engine should fail
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub attach: bool,
    pub create_offer: bool,
    pub create_answer: bool,
    pub set_remote: bool,
    pub add_candidate: bool,
}

/// Engine that records calls and answers with canned descriptions
pub struct MockEngine {
    participant_id: ParticipantId,
    sink: EngineEventSink,
    failures: Failures,
    offer_gate: Option<Arc<Notify>>,
    state: Mutex<ConnectionState>,
    calls: Mutex<Vec<EngineCall>>,
}

impl MockEngine {
    fn new(
        participant_id: ParticipantId,
        sink: EngineEventSink,
        failures: Failures,
        offer_gate: Option<Arc<Notify>>,
    ) -> Self {
        Self {
            participant_id,
            sink,
            failures,
            offer_gate,
            state: Mutex::new(ConnectionState::New),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sink the coordinator handed to this engine
    pub fn sink(&self) -> &EngineEventSink {
        &self.sink
    }

    /// Change the reported connection state and notify the coordinator
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
        self.sink.state_changed(state);
    }

    /// Every call so far
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// True once `close` was called
    pub fn is_closed(&self) -> bool {
        self.calls.lock().contains(&EngineCall::Close)
    }

    /// Canned offer body for this engine
    pub fn offer_sdp(&self) -> String {
        format!("offer-for-{}", self.participant_id)
    }

    /// Canned answer body for this engine
    pub fn answer_sdp(&self) -> String {
        format!("answer-for-{}", self.participant_id)
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl TransportEngine for MockEngine {
    async fn attach_local_media(&self, media: &LocalMedia) -> Result<()> {
        self.record(EngineCall::AttachLocalMedia(media.id().to_string()));
        if self.failures.attach {
            return Err(Error::MediaError("track rejected".to_string()));
        }
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record(EngineCall::CreateOffer);
        if let Some(gate) = &self.offer_gate {
            gate.notified().await;
        }
        if self.failures.create_offer {
            return Err(Error::SdpError("offer failed".to_string()));
        }
        Ok(SessionDescription::offer(self.offer_sdp()))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(EngineCall::CreateAnswer);
        if self.failures.create_answer {
            return Err(Error::SdpError("answer failed".to_string()));
        }
        Ok(SessionDescription::answer(self.answer_sdp()))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.record(EngineCall::SetLocalDescription(description.kind));
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.record(EngineCall::SetRemoteDescription(description));
        if self.failures.set_remote {
            return Err(Error::SdpError("remote description rejected".to_string()));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(EngineCall::AddIceCandidate(candidate));
        if self.failures.add_candidate {
            return Err(Error::IceCandidateError("candidate rejected".to_string()));
        }
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn close(&self) -> Result<()> {
        self.record(EngineCall::Close);
        *self.state.lock() = ConnectionState::Closed;
        Ok(())
    }
}

/// Factory producing [`MockEngine`]s and remembering each of them
#[derive(Default)]
pub struct MockEngineFactory {
    fail_create: Mutex<bool>,
    failures: Mutex<Failures>,
    offer_gate: Mutex<Option<Arc<Notify>>>,
    created: Mutex<Vec<(ParticipantId, Arc<MockEngine>)>>,
}

impl MockEngineFactory {
    /// Make engine construction fail
    pub fn fail_create(&self, fail: bool) {
        *self.fail_create.lock() = fail;
    }

    /// Failures applied to engines created from now on
    pub fn set_failures(&self, failures: Failures) {
        *self.failures.lock() = failures;
    }

    /// Hold `create_offer` of engines created from now on until the
    /// returned gate is notified
    pub fn gate_offers(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.offer_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Most recent engine created for `participant_id`
    pub fn engine(&self, participant_id: &str) -> Option<Arc<MockEngine>> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| id.as_str() == participant_id)
            .map(|(_, engine)| Arc::clone(engine))
    }

    /// Number of engines created so far
    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    /// Number of engines created for `participant_id`
    pub fn created_for(&self, participant_id: &str) -> usize {
        self.created
            .lock()
            .iter()
            .filter(|(id, _)| id.as_str() == participant_id)
            .count()
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn create_engine(
        &self,
        participant_id: &ParticipantId,
        events: EngineEventSink,
    ) -> Result<Arc<dyn TransportEngine>> {
        if *self.fail_create.lock() {
            return Err(Error::PeerConnectionError(
                "engine construction refused".to_string(),
            ));
        }

        let engine = Arc::new(MockEngine::new(
            participant_id.clone(),
            events,
            *self.failures.lock(),
            self.offer_gate.lock().clone(),
        ));
        self.created
            .lock()
            .push((participant_id.clone(), Arc::clone(&engine)));
        Ok(engine)
    }
}
