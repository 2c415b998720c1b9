//! tokio_relay - per-request execution engine for HTTP handler chains.
//!
//! A request matched to an ordered list of handlers is driven through a
//! cooperative chain: each handler may run the rest of the chain with
//! [`Context::next`], stop it with [`Context::abort`], share request-scoped
//! values through the context's scratch space and write the response once.
//!
//! # Features
//!
//! - **Handler chains**: wrap-style middleware with abort short-circuiting
//! - **Route groups**: nested prefixes with parent-first middleware
//! - **Recovery**: failed chains and panics become a fixed 500 response
//! - **Content negotiation**: Accept-header matching with JSON/XML/HTML payloads
//! - **Context pooling**: contexts are reset and reused between requests
//! - **Access Logging**: Structured JSON logging with tracing
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_relay::{handler, Engine, EngineConfig, Routes, Server, ServerConfig};
//! use http::StatusCode;
//!
//! let mut engine = Engine::with_default_middleware(&EngineConfig::default());
//! engine.get("/ping", [handler(|c| c.string(StatusCode::OK, "pong"))])?;
//!
//! let server = Server::new(ServerConfig::default(), engine);
//! server.run().await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod core;
pub mod engine;
pub mod logging;
pub mod middleware;
pub mod mode;
pub mod path;
pub mod pool;
pub mod render;
pub mod routing;
pub mod server;

// Re-exports for convenience
pub use crate::core::{handler, Context, Error, Handler, Negotiate, Request, Response, Result};
pub use config::{Config, EngineConfig, ServerConfig};
pub use engine::Engine;
pub use mode::Mode;
pub use routing::{RouterGroup, Routes};
pub use server::Server;
