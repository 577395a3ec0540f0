//! RTCLink client core: the session control plane for peer-to-peer and
//! conference real-time media.
//!
//! This crate coordinates signaling sessions; it never touches the media
//! path itself. ICE, DTLS/SRTP, RTP, and codecs belong to an external
//! engine driven through the [`media`] traits, and signaling bytes travel
//! over whatever [`SignalingTransport`](rtclink_signaling_core::SignalingTransport)
//! the application supplies.
//!
//! The architecture consists of:
//! - [`Client`] - the session manager the application talks to
//! - `channel` - one state-machine actor per remote endpoint or room
//! - [`Publication`] / [`Subscription`] - handles for active media flows
//! - [`StreamRegistry`] - the single authority on remote stream handles
//! - [`events`] - observer traits plus the ordered event dispatch task
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rtclink_client_core::{Client, LocalStream, NullMediaEngine, StreamSourceInfo};
//! use rtclink_signaling_core::LoopbackHub;
//!
//! # async fn run() -> rtclink_client_core::Result<()> {
//! let hub = LoopbackHub::new();
//! let client = Client::builder()
//!     .with_transport(hub.transport("alice"))
//!     .with_media_engine(Arc::new(NullMediaEngine))
//!     .build()
//!     .await?;
//!
//! client.connect("token").await?;
//! client.invite("bob").await?;
//!
//! let stream = LocalStream::new(StreamSourceInfo::microphone_and_camera());
//! let publication = client.publish(&stream, "bob", None).await?;
//! publication.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod media;
pub mod publication;
pub mod registry;
pub mod signaling;
pub mod stream;
pub mod subscription;
pub mod types;

pub use channel::SessionState;
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use errors::{ClientError, Result};
pub use events::{ClientObserver, EventDispatcher, PublicationObserver, SubscriptionObserver};
pub use media::{MediaEngine, MediaSession, NullMediaEngine};
pub use publication::Publication;
pub use registry::StreamRegistry;
pub use signaling::SignalEnvelope;
pub use stream::{
    AudioSource, LocalStream, RemoteStream, RemoteStreamKind, StreamInfo, StreamSourceInfo,
    VideoSource,
};
pub use subscription::Subscription;
pub use types::{
    AudioCodec, AudioCodecInfo, ConnectionStats, PublicationId, PublishOptions, Resolution,
    SessionMode, StreamCapabilities, SubscribeOptions, SubscriptionId, TrackKind, TrackStats,
    VideoCodec, VideoCodecInfo,
};
