//! CONNECT request wire format (RFC 1928 section 4).
//!
//! ```text
//! +-----+-----+-------+------+----------+----------+
//! | VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
//! +-----+-----+-------+------+----------+----------+
//! |  1  |  1  | X'00' |  1   | variable |    2     |
//! +-----+-----+-------+------+----------+----------+
//! ```

use crate::addr::{self, DestAddr};
use crate::error::ProtocolError;
use crate::negotiation::SOCKS_VERSION;

pub const CMD_CONNECT: u8 = 0x01;
pub const CMD_BIND: u8 = 0x02;
pub const CMD_UDP_ASSOCIATE: u8 = 0x03;

/// A SOCKS5 request command. Only [`Command::Connect`] is actionable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Bind,
    Associate,
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            CMD_CONNECT => Ok(Command::Connect),
            CMD_BIND => Ok(Command::Bind),
            CMD_UDP_ASSOCIATE => Ok(Command::Associate),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

impl Command {
    pub fn as_u8(self) -> u8 {
        match self {
            Command::Connect => CMD_CONNECT,
            Command::Bind => CMD_BIND,
            Command::Associate => CMD_UDP_ASSOCIATE,
        }
    }
}

/// A parsed connection request. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub command: Command,
    pub addr: DestAddr,
    pub port: u16,
}

impl ConnectRequest {
    /// Decode a request from the front of `buf`, returning it and the number
    /// of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        if buf.len() < 4 {
            return Err(ProtocolError::Truncated {
                need: 4,
                have: buf.len(),
            });
        }
        if buf[0] != SOCKS_VERSION {
            return Err(ProtocolError::BadVersion(buf[0]));
        }
        let command = Command::try_from(buf[1])?;
        // buf[2] is RSV; its value carries no meaning.
        let (addr, port, addr_consumed) = addr::decode(&buf[3..]).map_err(|e| match e {
            ProtocolError::Truncated { need, have } => ProtocolError::Truncated {
                need: need + 3,
                have: have + 3,
            },
            other => other,
        })?;
        Ok((
            ConnectRequest {
                command,
                addr,
                port,
            },
            3 + addr_consumed,
        ))
    }

    /// Encode the request back to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![SOCKS_VERSION, self.command.as_u8(), 0x00];
        addr::encode(&self.addr, self.port, &mut out);
        out
    }
}
