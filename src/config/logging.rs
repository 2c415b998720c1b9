//! Logging configuration.

use super::parse::env_or;
use super::ConfigError;

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human readable tracing output.
    Text,
}

const DEFAULT_FILTER: &str = "tokio_relay=info,access=info";
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "plain" => Ok(LogFormat::Text),
            other => Err(ConfigError::Invalid {
                key: "LOG_FORMAT".into(),
                message: format!("expected json or text, got '{}'", other),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// `EnvFilter` directives.
    pub filter: String,
    /// Reported as `ctx.service` on every JSON line.
    pub service_name: String,
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Reads `LOG_FORMAT`, `SERVICE_NAME` and the filter.
    ///
    /// The filter comes from `LOG_LEVEL` (a bare level applied to the crate
    /// and the access log), else `RUST_LOG` verbatim, else info.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            filter: Self::resolve_log_filter(),
            service_name: env_or("SERVICE_NAME", "tokio_relay"),
            format: env_or("LOG_FORMAT", "json").parse()?,
        })
    }

    fn resolve_log_filter() -> String {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            let level = level.to_ascii_lowercase();
            if LEVELS.contains(&level.as_str()) {
                return format!("tokio_relay={0},access={0}", level);
            }
            // subscriber is not installed yet
            eprintln!(
                "ignoring LOG_LEVEL '{}': expected one of {}",
                level,
                LEVELS.join(", ")
            );
        }
        std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_owned())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_owned(),
            service_name: "tokio_relay".to_string(),
            format: LogFormat::Json,
        }
    }
}
