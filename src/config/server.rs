//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::parse::{env_duration, env_or};
use super::ConfigError;

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080).
    pub listen_addr: SocketAddr,
    /// Maximum time to receive request headers.
    pub header_timeout: Duration,
    /// Graceful shutdown drain timeout.
    pub drain_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_value = env_or("LISTEN_ADDR", "0.0.0.0:8080");
        let listen_addr: SocketAddr = listen_value.parse().map_err(|e| ConfigError::Parse {
            key: "LISTEN_ADDR".into(),
            value: listen_value.clone(),
            error: format!("{}", e),
        })?;

        Ok(Self {
            listen_addr,
            header_timeout: env_duration("HEADER_TIMEOUT", Duration::from_secs(5))?,
            drain_timeout: env_duration("DRAIN_TIMEOUT", Duration::from_secs(30))?,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            header_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(30),
        }
    }
}
