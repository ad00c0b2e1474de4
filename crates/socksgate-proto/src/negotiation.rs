//! Method-selection sub-negotiation (RFC 1928 section 3).
//!
//! The client opens with a version identifier/method selection message:
//!
//! ```text
//! +-----+----------+----------+
//! | VER | NMETHODS | METHODS  |
//! +-----+----------+----------+
//! |  1  |    1     | 1 to 255 |
//! +-----+----------+----------+
//! ```
//!
//! and the server answers with the method it selected:
//!
//! ```text
//! +-----+--------+
//! | VER | METHOD |
//! +-----+--------+
//! |  1  |   1    |
//! +-----+--------+
//! ```

use crate::error::ProtocolError;

pub const SOCKS_VERSION: u8 = 0x05;

pub const METHOD_NO_AUTH: u8 = 0x00;
pub const METHOD_GSSAPI: u8 = 0x01;
pub const METHOD_USERNAME_PASSWORD: u8 = 0x02;
pub const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

/// An authentication method, as negotiated once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    NoAuth,
    Gssapi,
    UsernamePassword,
    NoAcceptable,
}

impl AuthMethod {
    pub fn as_u8(self) -> u8 {
        match self {
            AuthMethod::NoAuth => METHOD_NO_AUTH,
            AuthMethod::Gssapi => METHOD_GSSAPI,
            AuthMethod::UsernamePassword => METHOD_USERNAME_PASSWORD,
            AuthMethod::NoAcceptable => METHOD_NO_ACCEPTABLE,
        }
    }
}

/// Decode the method-selection message from the front of `buf`.
///
/// Returns the offered method bytes and the number of bytes consumed. A
/// version other than 5 or a declared method count of zero is fatal.
pub fn decode_methods(buf: &[u8]) -> Result<(Vec<u8>, usize), ProtocolError> {
    if buf.len() < 2 {
        return Err(ProtocolError::Truncated {
            need: 2,
            have: buf.len(),
        });
    }
    if buf[0] != SOCKS_VERSION {
        return Err(ProtocolError::BadVersion(buf[0]));
    }
    let nmethods = buf[1] as usize;
    if nmethods == 0 {
        return Err(ProtocolError::NoMethods);
    }
    if buf.len() < 2 + nmethods {
        return Err(ProtocolError::Truncated {
            need: 2 + nmethods,
            have: buf.len(),
        });
    }
    Ok((buf[2..2 + nmethods].to_vec(), 2 + nmethods))
}

/// Encode the server's method selection reply.
pub fn selection_reply(method: AuthMethod) -> [u8; 2] {
    [SOCKS_VERSION, method.as_u8()]
}

/// Selects the authentication method for a connection.
///
/// The supported set is supplied at construction, in preference order, so
/// server capability is a configuration concern rather than a protocol
/// constant.
#[derive(Debug, Clone)]
pub struct Negotiator {
    preference: Vec<AuthMethod>,
}

impl Negotiator {
    pub fn new(preference: Vec<AuthMethod>) -> Self {
        Negotiator { preference }
    }

    /// Pick the first supported method, in preference order, that the client
    /// offered. An empty intersection selects [`AuthMethod::NoAcceptable`].
    pub fn select(&self, offered: &[u8]) -> AuthMethod {
        self.preference
            .iter()
            .copied()
            .find(|method| offered.contains(&method.as_u8()))
            .unwrap_or(AuthMethod::NoAcceptable)
    }
}
