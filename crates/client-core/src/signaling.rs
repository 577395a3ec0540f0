//! Wire envelope for control-plane signaling.
//!
//! Only the `type` discriminator and the routing fields are interpreted
//! here; SDP descriptions, ICE candidates, and application data pass
//! through as opaque strings for the media engine or the application to
//! consume.

use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, Result};
use crate::stream::StreamInfo;
use crate::types::{SubscribeOptions, TrackKind};

/// One signaling message, serialized as internally tagged JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalEnvelope {
    /// Request a session with the receiving endpoint or room
    Invite,
    /// Accept a pending invite
    Accept,
    /// Refuse a pending invite
    Deny,
    /// End the session
    Stop,
    /// Application data
    Data { message: String },
    /// Session description produced by the media engine
    Sdp { description: String },
    /// ICE candidate produced by the media engine
    Ice { candidate: String },
    /// Announce a published stream
    Publish { stream: StreamInfo },
    /// Retire a published stream
    Unpublish { stream_id: String },
    /// Request a subscription to an announced stream
    Subscribe {
        stream_id: String,
        #[serde(default)]
        options: SubscribeOptions,
    },
    /// End a subscription
    Unsubscribe { stream_id: String },
    /// Request a track mute/unmute (conference)
    TrackControl {
        stream_id: String,
        track: TrackKind,
        muted: bool,
    },
    /// Server confirmation of a track mute/unmute
    TrackControlAck {
        stream_id: String,
        track: TrackKind,
        muted: bool,
    },
    /// A participant joined the room
    ParticipantJoined { participant_id: String },
    /// A participant left the room
    ParticipantLeft { participant_id: String },
    /// The server retired a stream
    StreamEnded { stream_id: String },
}

impl SignalEnvelope {
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ClientError::Unknown(format!("failed to encode signaling message: {e}")))
    }

    pub fn decode(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| ClientError::InvalidParam(format!("malformed signaling message: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let envelope = SignalEnvelope::TrackControl {
            stream_id: "s1".to_string(),
            track: TrackKind::Video,
            muted: true,
        };
        let payload = envelope.encode().unwrap();
        assert!(payload.contains("\"type\":\"track-control\""));

        match SignalEnvelope::decode(&payload).unwrap() {
            SignalEnvelope::TrackControl {
                stream_id,
                track,
                muted,
            } => {
                assert_eq!(stream_id, "s1");
                assert_eq!(track, TrackKind::Video);
                assert!(muted);
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn unit_variants_encode_with_type_only() {
        assert_eq!(
            SignalEnvelope::Invite.encode().unwrap(),
            "{\"type\":\"invite\"}"
        );
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(SignalEnvelope::decode("{\"type\":\"warp\"}").is_err());
        assert!(SignalEnvelope::decode("not json").is_err());
    }
}
