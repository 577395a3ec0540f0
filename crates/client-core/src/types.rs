//! Core types shared across the control plane: identifiers, track kinds,
//! codec descriptors, capability snapshots, and connection statistics.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a media track
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Operating mode of a session channel
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SessionMode {
    /// Direct two-party session with a remote endpoint
    Peer,
    /// Session with a room hosted by an MCU/SFU server
    Conference,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Peer => write!(f, "peer"),
            SessionMode::Conference => write!(f, "conference"),
        }
    }
}

/// Publication id type
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicationId(pub String);

impl PublicationId {
    pub fn new() -> Self {
        Self(format!("pub-{}", Uuid::new_v4()))
    }
}

impl Default for PublicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PublicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription id type
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(format!("sub-{}", Uuid::new_v4()))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Video resolution in pixels
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Audio codec identifiers
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Opus,
    Pcmu,
    Pcma,
    G722,
    Aac,
}

/// Video codec identifiers
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp8,
    Vp9,
    H264,
    Av1,
}

/// Audio codec plus optional clock/channel parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCodecInfo {
    pub codec: AudioCodec,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

impl AudioCodecInfo {
    pub fn new(codec: AudioCodec) -> Self {
        Self {
            codec,
            sample_rate: None,
            channels: None,
        }
    }
}

/// Video codec plus optional profile string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCodecInfo {
    pub codec: VideoCodec,
    pub profile: Option<String>,
}

impl VideoCodecInfo {
    pub fn new(codec: VideoCodec) -> Self {
        Self {
            codec,
            profile: None,
        }
    }
}

/// Capability snapshot advertised for a stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamCapabilities {
    pub audio: Vec<AudioCodecInfo>,
    pub video: Vec<VideoCodecInfo>,
    pub max_resolution: Option<Resolution>,
    pub max_frame_rate: Option<f64>,
    pub max_bitrate_bps: Option<u64>,
}

/// Per-publication codec and bitrate preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishOptions {
    pub audio_codecs: Vec<AudioCodecInfo>,
    pub video_codecs: Vec<VideoCodecInfo>,
    pub max_audio_bitrate_bps: Option<u64>,
    pub max_video_bitrate_bps: Option<u64>,
}

/// Per-subscription track selection and constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeOptions {
    pub audio: bool,
    pub video: bool,
    pub resolution: Option<Resolution>,
    pub frame_rate: Option<f64>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            resolution: None,
            frame_rate: None,
        }
    }
}

/// Track-level connection statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackStats {
    pub codec: Option<String>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub jitter_ms: f64,
}

/// Connection statistics reported by the media engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub round_trip: Option<Duration>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub audio: Option<TrackStats>,
    pub video: Option<TrackStats>,
}
