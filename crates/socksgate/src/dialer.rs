//! Outbound TCP dialing with failure classification.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;

use socksgate_proto::ReplyCode;

/// A failed dial attempt.
///
/// Classified so the connection can report a meaningful SOCKS5 reply code
/// before closing.
#[derive(Error, Debug)]
pub enum DialError {
    /// The configured connect timeout elapsed.
    #[error("dial timed out after {0:?}")]
    Timeout(Duration),

    /// Name resolution or the TCP connect itself failed.
    #[error("{0}")]
    Connect(#[from] io::Error),
}

impl DialError {
    /// Map the failure to the SOCKS5 reply code reported to the client.
    pub fn reply_code(&self) -> ReplyCode {
        match self {
            DialError::Timeout(_) => ReplyCode::HostUnreachable,
            DialError::Connect(e) => match e.kind() {
                io::ErrorKind::ConnectionRefused => ReplyCode::ConnectionRefused,
                io::ErrorKind::TimedOut => ReplyCode::HostUnreachable,
                io::ErrorKind::AddrNotAvailable => ReplyCode::NetworkUnreachable,
                _ => ReplyCode::GeneralFailure,
            },
        }
    }
}

/// Opens outbound connections for accepted requests.
///
/// One attempt per request; a failure is terminal for that connection, with
/// no retry and no fallback destination.
#[derive(Debug, Clone, Copy)]
pub struct Dialer {
    /// Connect timeout (zero = wait forever).
    connect_timeout: Duration,
}

impl Dialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Dialer { connect_timeout }
    }

    /// Open a TCP connection to `host:port`.
    pub async fn dial(&self, host: &str, port: u16) -> Result<TcpStream, DialError> {
        let target = format!("{}:{}", host, port);
        if self.connect_timeout.is_zero() {
            Ok(TcpStream::connect(&target).await?)
        } else {
            match timeout(self.connect_timeout, TcpStream::connect(&target)).await {
                Ok(connected) => Ok(connected?),
                Err(_) => Err(DialError::Timeout(self.connect_timeout)),
            }
        }
    }
}
