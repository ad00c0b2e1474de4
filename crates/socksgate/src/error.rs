//! Error types for socksgate

use thiserror::Error;

/// Main error type for the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    /// I/O error (network, file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protocol violation on the inbound stream
    #[error("Protocol error: {0}")]
    Protocol(#[from] socksgate_proto::ProtocolError),

    /// Outbound dial failure
    #[error("Dial error: {0}")]
    Dial(#[from] crate::dialer::DialError),

    /// Connection-level invariant failure
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type alias for ProxyError
pub type Result<T> = std::result::Result<T, ProxyError>;

impl From<serde_yaml::Error> for ProxyError {
    fn from(err: serde_yaml::Error) -> Self {
        ProxyError::Config(err.to_string())
    }
}
