//! socksgate-proto - SOCKS5 wire protocol and connection state machine.
//!
//! This crate provides:
//! - Wire codecs for the method-selection, CONNECT request and reply messages
//! - `Negotiator`: authentication method selection over a configured set
//! - `ConnectionStateMachine`: the per-connection protocol state machine,
//!   free of I/O so every transition is testable without sockets
//!
//! All socket handling lives in the `socksgate` server crate.

pub mod addr;
pub mod error;
pub mod machine;
pub mod negotiation;
pub mod reply;
pub mod request;

pub use addr::DestAddr;
pub use error::ProtocolError;
pub use machine::{Action, ConnectionStateMachine, Input, State};
pub use negotiation::{AuthMethod, Negotiator, SOCKS_VERSION};
pub use reply::ReplyCode;
pub use request::{Command, ConnectRequest};
