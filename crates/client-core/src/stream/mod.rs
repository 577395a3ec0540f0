//! Stream model: locally produced streams, remotely announced streams, and
//! the wire description exchanged in publish announcements.

mod local;
mod remote;

pub use local::LocalStream;
pub use remote::{RemoteStream, RemoteStreamKind};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::StreamCapabilities;

/// Origin of the audio side of a local stream
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioSource {
    Microphone,
    ScreenCast,
    File,
    Custom,
}

/// Origin of the video side of a local stream
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoSource {
    Camera,
    ScreenCast,
    File,
    Custom,
}

/// Which capture sources feed a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSourceInfo {
    pub audio: Option<AudioSource>,
    pub video: Option<VideoSource>,
}

impl StreamSourceInfo {
    /// Microphone audio plus camera video.
    pub fn microphone_and_camera() -> Self {
        Self {
            audio: Some(AudioSource::Microphone),
            video: Some(VideoSource::Camera),
        }
    }

    /// Microphone audio only.
    pub fn microphone() -> Self {
        Self {
            audio: Some(AudioSource::Microphone),
            video: None,
        }
    }

    /// Camera video only.
    pub fn camera() -> Self {
        Self {
            audio: None,
            video: Some(VideoSource::Camera),
        }
    }

    /// Screen-cast video with no audio.
    pub fn screen_cast() -> Self {
        Self {
            audio: None,
            video: Some(VideoSource::ScreenCast),
        }
    }
}

/// Wire description of a stream, carried in publish announcements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamInfo {
    pub id: String,
    /// Publishing endpoint id; empty when the stream is server-synthesized
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub source: StreamSourceInfo,
    #[serde(default)]
    pub capabilities: StreamCapabilities,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Viewport label for server-composed (mixed) streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<String>,
}
