//! Protocol violation taxonomy for the handshake phase.

use thiserror::Error;

use crate::request::Command;

/// A violation of the SOCKS5 wire protocol.
///
/// Apart from [`ProtocolError::Truncated`] (which may simply mean more bytes
/// are still in flight), every variant is fatal: the connection is closed
/// without a reply, since the handshake has no in-band error channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The version byte was not 0x05.
    #[error("unsupported SOCKS version {0:#04x}")]
    BadVersion(u8),

    /// The client declared zero authentication methods.
    #[error("client offered zero authentication methods")]
    NoMethods,

    /// The command byte does not name a SOCKS5 command.
    #[error("unknown command byte {0:#04x}")]
    UnknownCommand(u8),

    /// The command is valid SOCKS5 but this proxy does not serve it.
    #[error("unsupported command {0:?}")]
    UnsupportedCommand(Command),

    /// The address type byte does not name a SOCKS5 address type.
    #[error("unknown address type {0:#04x}")]
    UnknownAddressType(u8),

    /// IPv6 destinations are not implemented.
    #[error("address type not supported: IPv6")]
    UnsupportedAddressType,

    /// The buffer ends before the message does.
    #[error("truncated message: have {have} of {need} bytes")]
    Truncated { need: usize, have: usize },
}

impl ProtocolError {
    /// Whether the buffer was merely shorter than the message it started.
    pub fn is_truncated(&self) -> bool {
        matches!(self, ProtocolError::Truncated { .. })
    }
}
