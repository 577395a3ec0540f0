//! Signaling transport layer for the RTCLink SDK.
//!
//! The control plane in `rtclink-client-core` exchanges opaque text messages
//! with remote endpoints through a transport supplied by the embedding
//! application: a WebSocket connection, a REST long-poll, an XMPP session, or
//! anything else that can carry strings between named endpoints. This crate
//! defines that seam:
//!
//! - [`SignalingTransport`] - the duplex channel contract
//! - [`TransportEvent`] - inbound delivery (messages and disconnects)
//! - [`LoopbackHub`] - an in-process implementation used by tests, demos,
//!   and embedders that want a local transport
//!
//! The only ordering a transport must provide is per-sender FIFO. Consumers
//! tolerate duplicate `Disconnected` notifications.

pub mod error;
pub mod loopback;
pub mod transport;

pub use error::{Error, Result};
pub use loopback::{LoopbackHub, LoopbackTransport};
pub use transport::{Connection, SignalingTransport, TransportEvent};
