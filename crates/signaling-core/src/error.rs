use thiserror::Error;

/// Result type for signaling transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for signaling transport operations
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to establish the signaling connection
    #[error("Failed to connect to signaling server: {0}")]
    ConnectFailed(String),

    /// The server rejected the supplied token
    #[error("Signaling token rejected: {0}")]
    AuthRejected(String),

    /// Transport is not connected
    #[error("Transport not connected")]
    NotConnected,

    /// The named target is unknown or offline
    #[error("Target {0} is unreachable")]
    TargetUnreachable(String),

    /// Failed to send a message
    #[error("Failed to send message: {0}")]
    SendFailed(String),

    /// Transport closed
    #[error("Transport closed")]
    TransportClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
