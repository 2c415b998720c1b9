//! Built-in middleware.
//!
//! Middleware are ordinary [`Handler`](crate::core::Handler)s that use the
//! wrap pattern: do some work, call [`Context::next`](crate::core::Context::next)
//! to run the rest of the chain, then do post-processing.
//!
//! ```text
//! logger ─┐                          ┌─> logs status, bytes, latency
//!         └─> recovery ─┐        ┌───┘
//!                       └─> handler
//! ```

mod logger;
mod recovery;

pub use logger::{logger, logger_with_config, AccessLogConfig};
pub use recovery::{recovery, recovery_with_writer, DiagnosticSink};
