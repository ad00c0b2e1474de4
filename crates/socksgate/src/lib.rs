//! socksgate - SOCKS5 proxy front end
//!
//! This library provides the core of a SOCKS5 proxy that:
//! - Negotiates the authentication method (NO AUTH by default)
//! - Parses the CONNECT request and dials the requested destination
//! - Relays traffic transparently in both directions until either side
//!   closes
//!
//! BIND, UDP ASSOCIATE and IPv6 destinations are not served; requests for
//! them close the connection.

#[macro_use]
mod logging;

pub mod config;
pub mod dialer;
pub mod error;
pub mod server;

pub use config::Config;
pub use dialer::{DialError, Dialer};
pub use error::{ProxyError, Result};
pub use server::{Connection, Listener, ListenerStats, RelayPair};
