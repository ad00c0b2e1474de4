//! Configuration types

use serde::Deserialize;

use socksgate_proto::AuthMethod;

/// Root configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Server listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication negotiation configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.auth.preference().map(|_| ())
    }
}

/// Server listener configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Port to listen on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Upstream connect timeout in seconds (0 = no timeout)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum number of concurrent connections (0 = unlimited)
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            connect_timeout_secs: default_connect_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

/// Authentication negotiation configuration
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Methods offered for selection, in preference order.
    ///
    /// Known names: "none", "gssapi", "username-password". Only "none" has a
    /// working sub-negotiation; selecting any other method rejects the
    /// client as soon as it proceeds.
    #[serde(default = "default_auth_methods")]
    pub methods: Vec<String>,
}

impl AuthConfig {
    /// Resolve the configured method names, in order.
    pub fn preference(&self) -> Result<Vec<AuthMethod>, String> {
        if self.methods.is_empty() {
            return Err("auth.methods must not be empty".to_string());
        }
        self.methods
            .iter()
            .map(|name| match name.as_str() {
                "none" => Ok(AuthMethod::NoAuth),
                "gssapi" => Ok(AuthMethod::Gssapi),
                "username-password" => Ok(AuthMethod::UsernamePassword),
                other => Err(format!(
                    "Invalid auth method '{}'. Must be 'none', 'gssapi' or 'username-password'",
                    other
                )),
            })
            .collect()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            methods: default_auth_methods(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen_address() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    1080
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    1000
}

fn default_auth_methods() -> Vec<String> {
    vec!["none".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}
