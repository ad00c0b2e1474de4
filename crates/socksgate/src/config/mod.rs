//! Configuration module for socksgate
//!
//! ```yaml
//! server:
//!   listen_address: "127.0.0.1"
//!   listen_port: 1080
//!   connect_timeout_secs: 30
//!   max_connections: 1000
//!
//! auth:
//!   methods: ["none"]
//!
//! logging:
//!   level: "info"
//! ```
//!
//! Every field has a default, so the proxy also runs without a config file.

mod loader;
mod types;

pub use loader::{apply_env_overrides, load_config, load_config_from_str};
pub use types::*;
