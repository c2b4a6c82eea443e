use thiserror::Error;

use crate::normalize::InvalidDestination;

/// Top-level error type for the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing or malformed request input.
    #[error("{0}")]
    Validation(String),

    /// Destination could not be turned into a chat identifier.
    #[error(transparent)]
    InvalidDestination(#[from] InvalidDestination),

    /// The WhatsApp session is not authenticated and ready.
    #[error("WhatsApp client is not ready yet, try again in a few seconds")]
    NotReady,

    /// Lookup miss (e.g. no group with the requested name).
    #[error("{0}")]
    NotFound(String),

    /// Missing or wrong API key.
    #[error("unauthorized")]
    Unauthorized,

    /// Failure reported by (or while talking to) the automation client.
    #[error("client error: {0}")]
    Client(String),

    /// QR code could not be rendered.
    #[error("render error: {0}")]
    Render(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether the operation that produced this error may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Client(_))
    }
}
