//! Server module for socksgate
//!
//! This module contains:
//! - TCP listener
//! - Per-connection protocol driver
//! - Bidirectional relay

pub mod connection;
pub mod listener;
pub mod relay;

pub use connection::Connection;
pub use listener::{Listener, ListenerStats};
pub use relay::{DisconnectReason, RelayPair};
