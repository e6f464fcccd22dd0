//! Room signaling coordinator for WebRTC mesh calls
//!
//! This crate sits between a WebRTC transport engine and a room-based message
//! relay. It tracks room membership, brokers the offer/answer/candidate
//! exchange with every other participant and reports lifecycle events to the
//! host application. Media itself never passes through it.
//!
//! # Features
//!
//! - **Room lifecycle**: create-or-join, leave, admin kick
//! - **Mesh connections**: one transport engine per remote participant
//! - **Typed signaling**: relay events and peer messages as closed enums
//! - **Actor runtime**: one task owns all state; no locks on the hot path
//! - **Pluggable collaborators**: relay, engine and media source are traits,
//!   with WebSocket and webrtc-rs implementations included
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Host application                                        │
//! │  ↓ CoordinatorHandle (commands)   ↑ EventStream (events) │
//! │  Coordinator task                                        │
//! │  ├─ Session (membership, role, capabilities)             │
//! │  ├─ PeerRegistry                                         │
//! │  │   └─ PeerEntry → TransportEngine (webrtc-rs)          │
//! │  └─ RelayTransport (WebSocket / channel)                 │
//! │     ↕ RelayInbox                                         │
//! │  Relay server                                            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use room_signaling::CoordinatorConfig;
//!
//! let config = CoordinatorConfig {
//!     max_participants: 4,
//!     ..Default::default()
//! };
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Async Usage
//!
//! ```no_run
//! use room_signaling::{
//!     Coordinator, CoordinatorConfig, SampleTrackSource, WebRtcEngineFactory, WebSocketRelay,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> room_signaling::Result<()> {
//! let config = CoordinatorConfig::default();
//! let factory = Arc::new(WebRtcEngineFactory::new(&config));
//! let media = Arc::new(SampleTrackSource::new());
//!
//! let (coordinator, handle, mut events) = Coordinator::new(config, factory, media)?;
//! let relay = WebSocketRelay::connect("ws://localhost:3000", handle.relay_inbox()).await?;
//! tokio::spawn(coordinator.run(Arc::new(relay)));
//!
//! handle.join_room("lobby")?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;

pub use config::{CoordinatorConfig, LoggingConfig, NotificationMessages, TurnServerConfig};
pub use coordinator::{Coordinator, CoordinatorHandle, RelayInbox};
pub use error::{Error, Result};
pub use events::{CoordinatorEvent, ErrorCode, ErrorEvent, EventStream, NotificationKind};
pub use media::{
    AudioConstraints, LocalMedia, MediaSource, RemoteStream, RemoteTrack, SampleTrackSource,
    VideoCodec, VideoConstraints,
};
pub use peer::{
    ConnectionState, EngineEventSink, EngineFactory, PeerInfo, TransportEngine, WebRtcEngineFactory,
};
pub use session::{Capabilities, Membership, Role, Session};
pub use signaling::{
    ChannelRelay, IceCandidate, ParticipantId, RelayEvent, RelayRequest, RelayTransport, RoomId,
    SdpKind, SessionDescription, SignalMessage, WebSocketRelay,
};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
