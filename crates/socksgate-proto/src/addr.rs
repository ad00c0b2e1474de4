//! SOCKS5 destination address wire format.
//!
//! Addresses appear in CONNECT requests and replies as:
//!
//! ```text
//! +------+----------+----------+
//! | ATYP | DST.ADDR | DST.PORT |
//! +------+----------+----------+
//! |  1   | variable |    2     |
//! +------+----------+----------+
//! ```
//!
//! where DST.ADDR is 4 raw bytes (IPv4), a length byte followed by that many
//! name bytes (domain), or 16 raw bytes (IPv6, not implemented here). The
//! port is big-endian.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::ProtocolError;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

/// A parsed destination address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestAddr {
    Ipv4(Ipv4Addr),
    Domain(String),
}

impl DestAddr {
    /// The address as a host string suitable for dialing.
    ///
    /// IPv4 addresses render dotted-decimal. A domain that failed ASCII
    /// decoding is the empty string, which the dialer will reject.
    pub fn host(&self) -> String {
        match self {
            DestAddr::Ipv4(ip) => ip.to_string(),
            DestAddr::Domain(name) => name.clone(),
        }
    }
}

impl fmt::Display for DestAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestAddr::Ipv4(ip) => write!(f, "{}", ip),
            DestAddr::Domain(name) => write!(f, "{}", name),
        }
    }
}

/// Decode an ATYP + DST.ADDR + DST.PORT sequence from the front of `buf`.
///
/// Returns the address, the port and the number of bytes consumed.
pub fn decode(buf: &[u8]) -> Result<(DestAddr, u16, usize), ProtocolError> {
    let atyp = match buf.first() {
        Some(b) => *b,
        None => return Err(ProtocolError::Truncated { need: 1, have: 0 }),
    };
    match atyp {
        ATYP_IPV4 => {
            need(buf, 1 + 4 + 2)?;
            let ip = Ipv4Addr::new(buf[1], buf[2], buf[3], buf[4]);
            let port = u16::from_be_bytes([buf[5], buf[6]]);
            Ok((DestAddr::Ipv4(ip), port, 7))
        }
        ATYP_DOMAIN => {
            need(buf, 2)?;
            let len = buf[1] as usize;
            need(buf, 2 + len + 2)?;
            let raw = &buf[2..2 + len];
            // A name with non-ASCII bytes has no defined meaning on the wire;
            // surface an empty host so the dial fails instead of proceeding
            // with garbage.
            let host = if raw.is_ascii() {
                String::from_utf8_lossy(raw).into_owned()
            } else {
                String::new()
            };
            let port = u16::from_be_bytes([buf[2 + len], buf[3 + len]]);
            Ok((DestAddr::Domain(host), port, 2 + len + 2))
        }
        ATYP_IPV6 => Err(ProtocolError::UnsupportedAddressType),
        other => Err(ProtocolError::UnknownAddressType(other)),
    }
}

/// Encode an address + port as ATYP + DST.ADDR + DST.PORT into `out`.
pub fn encode(addr: &DestAddr, port: u16, out: &mut Vec<u8>) {
    match addr {
        DestAddr::Ipv4(ip) => {
            out.push(ATYP_IPV4);
            out.extend_from_slice(&ip.octets());
        }
        DestAddr::Domain(name) => {
            debug_assert!(name.len() <= u8::MAX as usize);
            out.push(ATYP_DOMAIN);
            out.push(name.len() as u8);
            out.extend_from_slice(name.as_bytes());
        }
    }
    out.extend_from_slice(&port.to_be_bytes());
}

fn need(buf: &[u8], need: usize) -> Result<(), ProtocolError> {
    if buf.len() < need {
        Err(ProtocolError::Truncated {
            need,
            have: buf.len(),
        })
    } else {
        Ok(())
    }
}
