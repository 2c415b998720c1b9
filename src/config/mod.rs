//! Process configuration, read once from the environment at startup.
//!
//! Each section owns its variables; [`Config::from_env`] fails on the first
//! value that does not parse.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_relay::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("Mode: {}", config.engine.mode);
//! ```

mod engine;
mod error;
mod logging;
mod parse;
mod server;

pub use engine::EngineConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use server::ServerConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Engine configuration.
    pub engine: EngineConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            engine: EngineConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Mode: {}", self.engine.mode);
        info!("  Header read timeout: {:?}", self.server.header_timeout);
        info!("  Drain timeout: {:?}", self.server.drain_timeout);
        info!("  Context pool: {} idle max", self.engine.pool_size);
        info!("  Stream buffer: {} chunks", self.engine.stream_buffer);

        if self.engine.redirect_fixed_path {
            info!("  Redirect fixed path: enabled");
        }

        if self.engine.forwarded_by_client_ip {
            info!("  Client IP from X-Forwarded-For/X-Real-Ip: enabled");
        }

        info!("  Log format: {:?}", self.logging.format);
    }
}
