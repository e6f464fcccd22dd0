//! Room client binary entry point
//!
//! Joins a room through a WebSocket relay, publishes sample media tracks and
//! logs every coordinator event.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin room_client -- \
//!   --relay-url ws://localhost:3000 \
//!   --room lobby
//!
//! # Load STUN/TURN servers and notification texts from a file
//! cargo run --bin room_client -- --room lobby --config ./room.toml
//! ```

use clap::Parser;
use room_signaling::{
    AudioConstraints, Coordinator, CoordinatorConfig, CoordinatorEvent, CoordinatorHandle,
    EventStream, SampleTrackSource, VideoCodec, VideoConstraints, WebRtcEngineFactory,
    WebSocketRelay,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long to wait for the relay to confirm a leave request
const LEAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Room signaling client
///
/// Connects to a relay server, joins a room and establishes a WebRTC
/// connection with every other participant.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the relay server
    #[arg(long, default_value = "ws://localhost:3000", env = "ROOM_RELAY_URL")]
    relay_url: String,

    /// Room to create or join
    #[arg(long, env = "ROOM_ID")]
    room: String,

    /// Coordinator configuration file (TOML)
    #[arg(long, env = "ROOM_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum concurrent participant connections (overrides the config file)
    #[arg(long, env = "ROOM_MAX_PARTICIPANTS")]
    max_participants: Option<usize>,

    /// Video codec for the local video track
    #[arg(long, default_value = "vp8", value_parser = parse_codec)]
    video_codec: VideoCodec,

    /// Publish audio only
    #[arg(long, default_value_t = false)]
    no_video: bool,
}

fn parse_codec(s: &str) -> Result<VideoCodec, String> {
    match s.to_lowercase().as_str() {
        "vp8" => Ok(VideoCodec::VP8),
        "vp9" => Ok(VideoCodec::VP9),
        "h264" => Ok(VideoCodec::H264),
        _ => Err(format!("Invalid video codec: {}. Use 'vp8', 'vp9' or 'h264'", s)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CoordinatorConfig::from_file(path)?,
        None => CoordinatorConfig::default(),
    };
    if let Some(max) = args.max_participants {
        config.max_participants = max;
    }
    config.validate()?;

    info!("Room signaling client v{}", room_signaling::version());
    info!("  Relay: {}", args.relay_url);
    info!("  Room: {}", args.room);
    info!("  ICE servers: {:?}", config.ice_servers);
    info!("  Max participants: {}", config.max_participants);

    let factory = Arc::new(WebRtcEngineFactory::new(&config));
    let media = Arc::new(SampleTrackSource::new());
    let (coordinator, handle, mut events) = Coordinator::new(config, factory, media)?;

    let relay = WebSocketRelay::connect(&args.relay_url, handle.relay_inbox()).await?;
    let task = tokio::spawn(coordinator.run(Arc::new(relay)));

    let video = VideoConstraints {
        enabled: !args.no_video,
        codec: args.video_codec,
    };
    let local = handle
        .acquire_local_media(AudioConstraints::default(), video)
        .await?;
    info!("Publishing {} local tracks", local.tracks().len());

    handle.join_room(args.room.as_str())?;

    info!("Client running. Press Ctrl+C to leave.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, leaving room...");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("Coordinator stopped");
                    break;
                };
                match &event {
                    CoordinatorEvent::RoomCreated { room_id } | CoordinatorEvent::RoomJoined { room_id } => {
                        info!(event = event.name(), room = %room_id, "In room");
                        handle.signal_stream_ready()?;
                    }
                    CoordinatorEvent::ParticipantStream { participant_id, stream } => {
                        info!(
                            event = event.name(),
                            participant = %participant_id,
                            stream = stream.id(),
                            tracks = stream.track_count(),
                            "Receiving media"
                        );
                    }
                    CoordinatorEvent::Error(e) => {
                        error!(event = event.name(), code = %e.code, "{}", e.message);
                    }
                    CoordinatorEvent::Notification { message, .. } => {
                        warn!(event = event.name(), "{}", message);
                    }
                    CoordinatorEvent::Kicked => {
                        warn!(event = event.name(), "Removed from the room by its admin");
                        break;
                    }
                    other => info!(event = other.name(), "{:?}", other),
                }
            }
        }
    }

    if handle.is_closed() {
        task.await?;
        return Ok(());
    }

    leave_if_joined(&handle, &mut events, LEAVE_TIMEOUT).await?;
    handle.shutdown().await?;
    task.await?;
    info!("Room client shut down gracefully");

    Ok(())
}

/// Leave the current room and wait for the relay to confirm it
///
/// Returns `None` when not in a room (e.g. after being kicked), otherwise
/// whether `RoomLeft` arrived within `wait`.
async fn leave_if_joined(
    handle: &CoordinatorHandle,
    events: &mut EventStream,
    wait: Duration,
) -> room_signaling::Result<Option<bool>> {
    if handle.room_id().await?.is_none() {
        return Ok(None);
    }
    handle.leave_room()?;

    let confirmed = async {
        while let Some(event) = events.recv().await {
            if let CoordinatorEvent::RoomLeft { room_id } = &event {
                info!(event = event.name(), room = %room_id, "Left room");
                return true;
            }
            debug!(event = event.name(), "Event while leaving: {:?}", event);
        }
        false
    };

    match timeout(wait, confirmed).await {
        Ok(confirmed) => Ok(Some(confirmed)),
        Err(_) => {
            warn!("Relay did not confirm leaving within {:?}", wait);
            Ok(Some(false))
        }
    }
}

fn init_tracing() {
    // Initialize tracing with EnvFilter for RUST_LOG support
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
