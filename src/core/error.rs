//! Core error types.

use std::fmt;

/// Errors that terminate a handler chain.
///
/// Handlers return these through `?`; every [`Context::next`] propagates them
/// unchanged, so the first recovery boundary up the call stack sees the
/// original error.
///
/// [`Context::next`]: crate::core::Context::next
#[derive(Debug)]
pub enum Error {
    /// Route method is not made of uppercase ASCII letters.
    InvalidMethod(String),

    /// Combined handler chain would reach the abort index.
    TooManyHandlers { len: usize },

    /// Method and path are already registered.
    DuplicateRoute { method: String, path: String },

    /// Scratch key requested through `must_get` does not exist.
    MissingKey(String),

    /// Content negotiation was asked to choose from nothing.
    NoOffers,

    /// Negotiated format has neither a specific nor a wildcard payload.
    MissingNegotiationData { format: String },

    /// Request decoding failed.
    Bind(String),

    /// Response encoding failed.
    Render(String),

    /// Response sink is detached or the client went away.
    Detached,

    /// Sink write failed.
    Io(std::io::Error),

    /// Free-form handler failure.
    Custom(String),
}

impl Error {
    /// True when the failure means the client can no longer be answered.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Error::Detached => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidMethod(method) => write!(f, "http method {} is not valid", method),
            Error::TooManyHandlers { len } => write!(f, "too many handlers: {}", len),
            Error::DuplicateRoute { method, path } => {
                write!(f, "handlers are already registered for {} {}", method, path)
            }
            Error::MissingKey(key) => write!(f, "key \"{}\" does not exist", key),
            Error::NoOffers => f.write_str("you must provide at least one offer"),
            Error::MissingNegotiationData { format } => {
                write!(f, "invalid negotiate config: no data for {}", format)
            }
            Error::Bind(msg) => write!(f, "bind error: {}", msg),
            Error::Render(msg) => write!(f, "render error: {}", msg),
            Error::Detached => f.write_str("response sink is detached"),
            Error::Io(e) => write!(f, "write failed: {}", e),
            Error::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Custom(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Custom(msg.to_owned())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
