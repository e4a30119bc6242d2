//! Error types for the mobius-stream crate.

/// Errors raised while receiving or decoding notifications.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The broker could not be reached or refused the connection
    #[error("Failed to connect to MQTT broker: {0}")]
    ConnectFailed(String),

    /// The broker rejected or never received the topic subscription
    #[error("Failed to subscribe: {0}")]
    Subscribe(String),

    /// An established connection was dropped
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// A notification payload is not a JSON document
    #[error("Malformed notification payload: {0}")]
    MalformedPayload(String),
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;
