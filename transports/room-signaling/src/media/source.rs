//! Local media acquisition

use super::LocalMedia;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use webrtc::api::media_engine::{MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_VP8, MIME_TYPE_VP9};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Audio capture constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConstraints {
    /// Capture audio at all
    pub enabled: bool,

    /// Clock rate in Hz (default: 48000)
    pub clock_rate: u32,

    /// Channel count (default: 2)
    pub channels: u16,
}

/// Video capture constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConstraints {
    /// Capture video at all
    pub enabled: bool,

    /// Video codec (default: VP8)
    pub codec: VideoCodec,
}

/// Supported video codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    /// VP8 codec (WebRTC standard, wide compatibility)
    VP8,
    /// VP9 codec (better compression, modern browsers)
    VP9,
    /// H.264 codec (universal compatibility)
    H264,
}

impl VideoCodec {
    /// MIME type registered with the media engine
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::VP8 => MIME_TYPE_VP8,
            VideoCodec::VP9 => MIME_TYPE_VP9,
            VideoCodec::H264 => MIME_TYPE_H264,
        }
    }
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            enabled: true,
            clock_rate: 48000,
            channels: 2,
        }
    }
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            enabled: true,
            codec: VideoCodec::VP8,
        }
    }
}

/// Facility that produces a local media handle from constraints
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Acquire local media
    ///
    /// Fails when the requested media is denied or unavailable.
    async fn acquire(&self, audio: &AudioConstraints, video: &VideoConstraints)
        -> Result<LocalMedia>;
}

/// Media source backed by sample-fed WebRTC tracks
///
/// Each acquisition creates fresh `TrackLocalStaticSample` tracks sharing one
/// stream id. The host writes encoded samples into them; the tracks are
/// returned through [`LocalMedia::tracks`].
#[derive(Debug, Default, Clone)]
pub struct SampleTrackSource;

impl SampleTrackSource {
    /// Create a new sample track source
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaSource for SampleTrackSource {
    async fn acquire(
        &self,
        audio: &AudioConstraints,
        video: &VideoConstraints,
    ) -> Result<LocalMedia> {
        if !audio.enabled && !video.enabled {
            return Err(Error::MediaError(
                "At least one of audio or video must be requested".to_string(),
            ));
        }

        let stream_id = uuid::Uuid::new_v4().to_string();
        let mut media = LocalMedia::new(stream_id.clone());

        if audio.enabled {
            if audio.channels == 0 || audio.clock_rate == 0 {
                return Err(Error::MediaError(format!(
                    "Unsupported audio constraints: {} Hz, {} channels",
                    audio.clock_rate, audio.channels
                )));
            }

            let track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_string(),
                    clock_rate: audio.clock_rate,
                    channels: audio.channels,
                    ..Default::default()
                },
                "audio".to_string(),
                stream_id.clone(),
            ));
            debug!("Created local audio track for stream {}", stream_id);
            media = media.with_track(track);
        }

        if video.enabled {
            let track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: video.codec.mime_type().to_string(),
                    clock_rate: 90000,
                    ..Default::default()
                },
                "video".to_string(),
                stream_id.clone(),
            ));
            debug!("Created local video track for stream {}", stream_id);
            media = media.with_track(track);
        }

        info!(
            "Acquired local media {} ({} tracks)",
            stream_id,
            media.tracks().len()
        );

        Ok(media)
    }
}
