//! Error types for the roomctl-client crate.

/// Errors from talking to a roomctl server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The realtime socket could not be opened
    #[error("WebSocket connect failed: {0}")]
    Connect(String),

    /// The realtime socket failed after it was open
    #[error("WebSocket error: {0}")]
    Socket(String),

    /// An HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with something that isn't a device list
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Socket(error.to_string())
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
