//! Transport engine backed by webrtc-rs

use super::engine::{ConnectionState, EngineEventSink, EngineFactory, TransportEngine};
use crate::config::CoordinatorConfig;
use crate::media::{LocalMedia, RemoteStream, RemoteTrack};
use crate::signaling::{IceCandidate, ParticipantId, SdpKind, SessionDescription};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

impl From<RTCPeerConnectionState> for ConnectionState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
            RTCPeerConnectionState::Connected => ConnectionState::Connected,
            RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
            RTCPeerConnectionState::Failed => ConnectionState::Failed,
            RTCPeerConnectionState::Closed => ConnectionState::Closed,
            _ => ConnectionState::New,
        }
    }
}

/// Creates [`WebRtcEngine`]s using the ICE/TURN servers from the configuration
pub struct WebRtcEngineFactory {
    rtc_config: RTCConfiguration,
}

impl WebRtcEngineFactory {
    /// Create a factory from coordinator configuration
    pub fn new(config: &CoordinatorConfig) -> Self {
        let ice_servers: Vec<RTCIceServer> = config
            .ice_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(config.turn_servers.iter().map(|turn| {
                #[allow(clippy::needless_update)]
                RTCIceServer {
                    urls: vec![turn.url.clone()],
                    username: turn.username.clone(),
                    credential: turn.credential.clone(),
                    ..Default::default()
                }
            }))
            .collect();

        Self {
            rtc_config: RTCConfiguration {
                ice_servers,
                ..Default::default()
            },
        }
    }

    /// Number of configured ICE servers (STUN and TURN)
    pub fn ice_server_count(&self) -> usize {
        self.rtc_config.ice_servers.len()
    }
}

#[async_trait]
impl EngineFactory for WebRtcEngineFactory {
    async fn create_engine(
        &self,
        participant_id: &ParticipantId,
        events: EngineEventSink,
    ) -> Result<Arc<dyn TransportEngine>> {
        let engine = WebRtcEngine::new(participant_id.clone(), self.rtc_config.clone(), events).await?;
        Ok(Arc::new(engine))
    }
}

/// One webrtc-rs peer connection to a remote participant
pub struct WebRtcEngine {
    participant_id: ParticipantId,
    peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<Vec<Arc<RTCRtpSender>>>,
}

impl WebRtcEngine {
    /// Build the peer connection and wire its callbacks into `events`
    #[instrument(skip(rtc_config, events), fields(participant = %participant_id))]
    pub async fn new(
        participant_id: ParticipantId,
        rtc_config: RTCConfiguration,
        events: EngineEventSink,
    ) -> Result<Self> {
        info!("Creating peer connection for participant {}", participant_id);

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::WebRtcError(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::PeerConnectionError(format!("Failed to create peer connection: {}", e))
        })?);

        let sink = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let sink = sink.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    sink.ice_candidate(None);
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => sink.ice_candidate(Some(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_mline_index: init.sdp_mline_index,
                    })),
                    Err(e) => warn!(
                        "Dropping unserializable ICE candidate for {}: {}",
                        sink.participant_id(),
                        e
                    ),
                }
            })
        }));

        let sink = events.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let sink = sink.clone();
                Box::pin(async move {
                    debug!(
                        "Remote track {} on stream {} from {}",
                        track.id(),
                        track.stream_id(),
                        sink.participant_id()
                    );
                    let stream = RemoteStream::new(track.stream_id())
                        .with_track(RemoteTrack::from_rtp(track));
                    sink.track(stream);
                })
            },
        ));

        let sink = events;
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let sink = sink.clone();
                Box::pin(async move {
                    debug!("Peer {} state changed: {}", sink.participant_id(), state);
                    sink.state_changed(state.into());
                })
            },
        ));

        Ok(Self {
            participant_id,
            peer_connection,
            senders: Mutex::new(Vec::new()),
        })
    }

    fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
        let parsed = match description.kind {
            SdpKind::Offer => RTCSessionDescription::offer(description.sdp),
            SdpKind::Answer => RTCSessionDescription::answer(description.sdp),
        };
        parsed.map_err(|e| Error::SdpError(format!("Failed to parse description: {}", e)))
    }
}

#[async_trait]
impl TransportEngine for WebRtcEngine {
    async fn attach_local_media(&self, media: &LocalMedia) -> Result<()> {
        for track in media.tracks() {
            let sender = self
                .peer_connection
                .add_track(Arc::clone(track))
                .await
                .map_err(|e| {
                    Error::MediaError(format!(
                        "Failed to attach track {} for {}: {}",
                        track.id(),
                        self.participant_id,
                        e
                    ))
                })?;
            self.senders.lock().push(sender);
        }

        debug!(
            "Attached {} local tracks for {}",
            media.tracks().len(),
            self.participant_id
        );
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create offer: {}", e)))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create answer: {}", e)))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(Self::to_rtc(description)?)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(Self::to_rtc(description)?)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };

        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::IceCandidateError(format!("Failed to add ICE candidate: {}", e)))
    }

    fn connection_state(&self) -> ConnectionState {
        self.peer_connection.connection_state().into()
    }

    async fn close(&self) -> Result<()> {
        info!("Closing peer connection for {}", self.participant_id);
        self.senders.lock().clear();
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::PeerConnectionError(format!("Failed to close connection: {}", e)))
    }
}
