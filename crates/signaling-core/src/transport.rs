use std::fmt;

use tokio::sync::mpsc;

use crate::error::Result;

/// Events emitted by a signaling transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A signaling message was received
    MessageReceived {
        /// Endpoint id of the sender
        from: String,
        /// Opaque message payload
        payload: String,
    },

    /// The transport lost its connection to the signaling server
    Disconnected,
}

/// Live connection returned by a successful [`SignalingTransport::connect`]
#[derive(Debug)]
pub struct Connection {
    /// Endpoint id assigned by the signaling server
    pub local_id: String,
    /// Inbound event stream. Messages from a single sender arrive in the
    /// order they were sent; no cross-sender ordering is implied.
    pub events: mpsc::Receiver<TransportEvent>,
}

/// A duplex signaling channel supplied by the embedding application.
///
/// Implementations carry opaque text payloads between named endpoints. The
/// control plane assumes nothing about the wire beyond per-sender FIFO
/// delivery and tolerates duplicate [`TransportEvent::Disconnected`] events.
#[async_trait::async_trait]
pub trait SignalingTransport: Send + Sync + fmt::Debug {
    /// Open the connection, authenticating with `token`.
    async fn connect(&self, token: &str) -> Result<Connection>;

    /// Send `payload` to `target`, or broadcast when no target is given.
    async fn send_message(&self, payload: &str, target: Option<&str>) -> Result<()>;

    /// Close the connection.
    async fn disconnect(&self) -> Result<()>;
}
