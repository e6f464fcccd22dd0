//! Relay transport abstraction

use super::protocol::RelayRequest;
use crate::{Error, Result};
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound half of the message-relay channel
///
/// `send` must not block: implementations queue the request and deliver it
/// from their own task. Inbound events are pushed into the coordinator
/// through a [`RelayInbox`](crate::RelayInbox).
pub trait RelayTransport: Send + Sync {
    /// Queue a request for delivery to the relay server
    fn send(&self, request: RelayRequest) -> Result<()>;
}

/// In-memory relay that hands every request to an mpsc receiver
///
/// Useful when the host application already owns a relay connection and
/// only wants the coordinator's outbound traffic as typed values.
#[derive(Clone)]
pub struct ChannelRelay {
    tx: mpsc::UnboundedSender<RelayRequest>,
}

impl ChannelRelay {
    /// Create a relay together with the receiver of its outbound requests
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RelayRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RelayTransport for ChannelRelay {
    fn send(&self, request: RelayRequest) -> Result<()> {
        debug!("Queueing relay request: {:?}", request);
        self.tx
            .send(request)
            .map_err(|e| Error::RelayError(format!("Relay receiver dropped: {}", e)))
    }
}
