//! WebSocket relay transport
//!
//! Carries [`RelayRequest`]s and [`RelayEvent`]s as JSON text frames.

use super::protocol::{RelayEvent, RelayRequest};
use super::relay::RelayTransport;
use crate::coordinator::RelayInbox;
use crate::{Error, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Relay transport over a WebSocket connection
pub struct WebSocketRelay {
    /// Relay server URL
    url: String,

    /// Outgoing message sender
    tx: mpsc::UnboundedSender<Message>,
}

impl WebSocketRelay {
    /// Connect to the relay server
    ///
    /// Establishes the WebSocket connection and starts background tasks for
    /// sending and receiving frames. Every parsed inbound event is delivered
    /// to `inbox`.
    ///
    /// # Arguments
    ///
    /// * `url` - Relay server URL (ws:// or wss://)
    /// * `inbox` - Coordinator inbox receiving inbound relay events
    pub async fn connect(url: &str, inbox: RelayInbox) -> Result<Self> {
        info!("Connecting to relay server: {}", url);

        let (ws_stream, _) = connect_async(url).await?;

        info!("Connected to relay server");

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::sender_task(write, rx));
        tokio::spawn(Self::receiver_task(read, inbox));

        Ok(Self {
            url: url.to_string(),
            tx,
        })
    }

    /// Relay server URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sender task: sends messages from channel to WebSocket
    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }

        debug!("Relay sender task terminated");
    }

    /// Receiver task: parses frames from WebSocket and feeds the inbox
    async fn receiver_task(mut read: futures::stream::SplitStream<WsStream>, inbox: RelayInbox) {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match RelayEvent::from_json(&text) {
                    Ok(event) => {
                        if inbox.deliver(event).is_err() {
                            debug!("Coordinator closed, dropping relay connection");
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed relay frame: {}", e),
                },
                Ok(Message::Close(_)) => {
                    info!("Relay connection closed");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        debug!("Relay receiver task terminated");
    }
}

impl RelayTransport for WebSocketRelay {
    fn send(&self, request: RelayRequest) -> Result<()> {
        let json = request.to_json()?;
        debug!("Sending relay request: {}", json);

        self.tx
            .send(Message::Text(json))
            .map_err(|e| Error::WebSocketError(format!("Failed to queue frame: {}", e)))
    }
}
