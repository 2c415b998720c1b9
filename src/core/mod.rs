//! Core per-request types.
//!
//! - [`Context`] - request state, the handler-chain cursor and scratch space
//! - [`ResponseWriter`] - status and header bookkeeping over a [`Sink`]
//! - [`Handler`] / [`HandlersChain`] - the units a route runs
//! - [`Error`] - fatal errors returned through the chain
//! - [`ErrorList`] - request-time errors recorded on the context
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_relay::core::{handler, Context};
//! use http::StatusCode;
//!
//! let hello = handler(|c: &mut Context| {
//!     let name = c.default_query("name", "world");
//!     c.string(StatusCode::OK, &format!("hello {}", name))
//! });
//! ```

mod context;
mod error;
pub mod errors;
mod handler;
mod negotiate;
mod params;
mod request;
mod response;
mod sink;
mod writer;

pub use context::{Context, ContextConfig, Value, ABORT_INDEX};
pub use error::{Error, Result};
pub use errors::{ErrorKind, ErrorList, RecordedError};
pub use handler::{empty_chain, handler, Handler, HandlersChain};
pub use negotiate::{parse_accept, Negotiate};
pub use params::{Param, Params};
pub use request::Request;
pub use response::Response;
pub use sink::{BufferSink, Sink};
pub use writer::{body_allowed_for_status, ResponseWriter};
