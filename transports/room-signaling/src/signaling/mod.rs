//! Relay protocol and transports
//!
//! The coordinator talks to the relay server through the [`RelayTransport`]
//! trait. Two transports are provided:
//! - [`ChannelRelay`]: in-memory, hands requests to an mpsc receiver
//! - [`WebSocketRelay`]: JSON text frames over a WebSocket

pub mod protocol;
pub mod relay;
pub mod websocket;

pub use protocol::{
    IceCandidate, ParticipantId, RelayEvent, RelayRequest, RoomId, SdpKind, SessionDescription,
    SignalMessage,
};
pub use relay::{ChannelRelay, RelayTransport};
pub use websocket::WebSocketRelay;
