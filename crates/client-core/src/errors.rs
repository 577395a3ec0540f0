use thiserror::Error;

/// Result type for control-plane operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Typed error taxonomy shared by every control-plane component.
///
/// Errors are always reported through the failing call's `Result`; nothing
/// panics across the asynchronous boundary and there is no silent failure
/// path.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Operation is not valid in the current session or publication state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed target id, stream, or options
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    /// Operation unsupported in the current mode
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The remote endpoint rejected the request
    #[error("Remote endpoint refused: {0}")]
    RemoteNotAllowed(String),

    /// The remote endpoint is unknown to the signaling server
    #[error("Remote endpoint does not exist: {0}")]
    RemoteNotExisting(String),

    /// The signaling server rejected the token
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The target was offline at send time
    #[error("Message undeliverable: {0}")]
    MessageUnreachable(String),

    /// Signaling transport failure
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Media engine failure
    #[error("Media error: {0}")]
    Media(String),

    /// Catch-all for unexpected failures
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<rtclink_signaling_core::Error> for ClientError {
    fn from(err: rtclink_signaling_core::Error) -> Self {
        use rtclink_signaling_core::Error as TransportError;
        match err {
            TransportError::AuthRejected(reason) => ClientError::AuthFailed(reason),
            TransportError::TargetUnreachable(target) => ClientError::MessageUnreachable(target),
            TransportError::NotConnected | TransportError::TransportClosed => {
                ClientError::InvalidState("signaling transport is not connected".to_string())
            }
            other => ClientError::Signaling(other.to_string()),
        }
    }
}
