//! Configuration loader

use std::path::Path;

use super::Config;
use crate::error::{ProxyError, Result};

/// Load configuration from a YAML file
///
/// Also applies SOCKSGATE_* env var overrides after loading.
pub fn load_config(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)?;
    let mut config: Config = serde_yaml::from_str(&contents)?;
    apply_env_overrides(&mut config);
    config.validate().map_err(ProxyError::Config)?;
    Ok(config)
}

/// Load configuration from a YAML string (useful for testing)
///
/// Also applies SOCKSGATE_* env var overrides after loading.
pub fn load_config_from_str(yaml: &str) -> Result<Config> {
    let mut config: Config = serde_yaml::from_str(yaml)?;
    apply_env_overrides(&mut config);
    config.validate().map_err(ProxyError::Config)?;
    Ok(config)
}

/// Apply SOCKSGATE_* environment variable overrides to a config.
///
/// Any set env var overrides the corresponding config value.
///
/// Supported env vars:
/// - `SOCKSGATE_LISTEN_ADDRESS` - Override listen address
/// - `SOCKSGATE_LISTEN_PORT` - Override listen port
/// - `SOCKSGATE_CONNECT_TIMEOUT_SECS` - Override upstream connect timeout
/// - `SOCKSGATE_MAX_CONNECTIONS` - Override max connections
/// - `SOCKSGATE_LOG_LEVEL` - Override log level
pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("SOCKSGATE_LISTEN_ADDRESS") {
        debug!("Overriding listen_address from SOCKSGATE_LISTEN_ADDRESS");
        config.server.listen_address = val;
    }
    if let Ok(val) = std::env::var("SOCKSGATE_LISTEN_PORT") {
        if let Ok(port) = val.parse::<u16>() {
            debug!("Overriding listen_port from SOCKSGATE_LISTEN_PORT");
            config.server.listen_port = port;
        }
    }
    if let Ok(val) = std::env::var("SOCKSGATE_CONNECT_TIMEOUT_SECS") {
        if let Ok(secs) = val.parse::<u64>() {
            debug!("Overriding connect_timeout from SOCKSGATE_CONNECT_TIMEOUT_SECS");
            config.server.connect_timeout_secs = secs;
        }
    }
    if let Ok(val) = std::env::var("SOCKSGATE_MAX_CONNECTIONS") {
        if let Ok(max) = val.parse::<usize>() {
            debug!("Overriding max_connections from SOCKSGATE_MAX_CONNECTIONS");
            config.server.max_connections = max;
        }
    }
    if let Ok(val) = std::env::var("SOCKSGATE_LOG_LEVEL") {
        debug!("Overriding log level from SOCKSGATE_LOG_LEVEL");
        config.logging.level = val;
    }
}
