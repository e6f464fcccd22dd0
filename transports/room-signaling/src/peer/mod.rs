//! Per-participant peer connections
//!
//! [`TransportEngine`] is the seam to the media transport: one instance per
//! remote participant, created through an [`EngineFactory`]. The coordinator
//! keeps them in a [`PeerRegistry`]. [`WebRtcEngineFactory`] provides the
//! webrtc-rs implementation.

pub mod engine;
pub mod registry;
pub mod webrtc_engine;

pub use engine::{
    ConnectionState, EngineEvent, EngineEventSink, EngineFactory, EngineNotice, TransportEngine,
};
pub use registry::{PeerEntry, PeerInfo, PeerRegistry};
pub use webrtc_engine::{WebRtcEngine, WebRtcEngineFactory};
