//! Engine configuration.

use crate::mode::Mode;

use super::parse::{env_bool, env_opt, env_parse};
use super::ConfigError;

/// Request engine configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Engine mode (RELAY_MODE: debug, release, test).
    pub mode: Mode,
    /// Redirect to the cleaned path when only the cleaned path matches a route.
    pub redirect_fixed_path: bool,
    /// Trust X-Forwarded-For / X-Real-Ip when resolving the client IP.
    pub forwarded_by_client_ip: bool,
    /// Maximum number of idle contexts kept for reuse.
    pub pool_size: usize,
    /// Chunks buffered between a streaming handler and the connection.
    pub stream_buffer: usize,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = parse_mode(env_opt("RELAY_MODE"))?;

        let stream_buffer: usize = env_parse("STREAM_BUFFER", 16)?;
        if stream_buffer == 0 {
            return Err(ConfigError::Invalid {
                key: "STREAM_BUFFER".into(),
                message: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            mode,
            redirect_fixed_path: env_bool("REDIRECT_FIXED_PATH", true),
            forwarded_by_client_ip: env_bool("FORWARDED_BY_CLIENT_IP", true),
            pool_size: env_parse("CONTEXT_POOL_SIZE", 1024)?,
            stream_buffer,
        })
    }
}

fn parse_mode(value: Option<String>) -> Result<Mode, ConfigError> {
    match value {
        Some(value) => value.parse::<Mode>().map_err(|message| ConfigError::Invalid {
            key: "RELAY_MODE".into(),
            message,
        }),
        None => Ok(Mode::Debug),
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Debug,
            redirect_fixed_path: true,
            forwarded_by_client_ip: true,
            pool_size: 1024,
            stream_buffer: 16,
        }
    }
}
