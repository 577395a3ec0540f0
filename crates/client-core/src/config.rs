use crate::types::{AudioCodec, AudioCodecInfo, PublishOptions, VideoCodec, VideoCodecInfo};

/// Configuration passed at [`Client`](crate::Client) construction.
///
/// The process-wide toggles comparable SDKs keep in global state (hardware
/// acceleration, default publish settings) are explicit fields here.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Human-readable client name, used in log output
    pub name: String,
    /// Prefer hardware-accelerated encode/decode when the engine supports it
    pub hardware_acceleration: bool,
    /// Options applied when `publish` is called without any
    pub default_publish_options: PublishOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "rtclink-client".to_string(),
            hardware_acceleration: false,
            default_publish_options: PublishOptions {
                audio_codecs: vec![AudioCodecInfo::new(AudioCodec::Opus)],
                video_codecs: vec![VideoCodecInfo::new(VideoCodec::Vp8)],
                max_audio_bitrate_bps: None,
                max_video_bitrate_bps: None,
            },
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client name used in log output.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable or disable hardware-accelerated encode/decode.
    pub fn with_hardware_acceleration(mut self, enabled: bool) -> Self {
        self.hardware_acceleration = enabled;
        self
    }

    /// Replace the default publish options.
    pub fn with_default_publish_options(mut self, options: PublishOptions) -> Self {
        self.default_publish_options = options;
        self
    }
}
