//! Access logging middleware.
//!
//! Logs each request after the rest of the chain has run, with target
//! "access" so the JSON formatter tags it as an access entry.

use std::collections::HashSet;
use std::time::Instant;

use http::StatusCode;
use tracing::info;

use crate::core::{Context, ErrorKind, Handler};
use crate::logging::ACCESS_TARGET;

/// Access log configuration.
#[derive(Clone, Debug)]
pub struct AccessLogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,
    /// Paths that are never logged (health checks and the like).
    pub skip_paths: Vec<String>,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_paths: Vec::new(),
        }
    }
}

/// Access logger with the default configuration.
pub fn logger() -> Handler {
    logger_with_config(AccessLogConfig::default())
}

/// Access logger.
///
/// Runs the rest of the chain first, then logs method, path, status, bytes,
/// latency, client address and any private errors recorded on the context.
pub fn logger_with_config(config: AccessLogConfig) -> Handler {
    let skip: HashSet<String> = config.skip_paths.into_iter().collect();
    let enabled = config.enabled;

    Handler::named("tokio_relay::middleware::logger", move |c: &mut Context| {
        let started = Instant::now();
        let path = c.request().path().to_string();
        let query = c.request().query().map(str::to_string);

        let result = c.next();

        if !enabled || skip.contains(&path) {
            return result;
        }

        // the engine answers 500 for an unwritten failed chain
        let status = if result.is_err() && !c.writer().written() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            c.writer().status()
        };

        let private = c.errors().by_kind(ErrorKind::PRIVATE);
        let errors = (!private.is_empty()).then(|| {
            private
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        });

        info!(
            target: ACCESS_TARGET,
            method = %c.request().method(),
            path = path.as_str(),
            query = query.as_deref(),
            status = status.as_u16(),
            bytes = c.writer().size().unwrap_or(0) as u64,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            ip = c.client_ip().as_str(),
            ua = c.request().user_agent(),
            handler = c.handler_name(),
            errors = errors.as_deref(),
        );

        result
    })
}
