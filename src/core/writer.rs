//! Response writer that decorates a [`Sink`].
//!
//! Status and headers stay mutable until the first body write (or an explicit
//! [`ResponseWriter::write_header_now`]). From then on the status is frozen and
//! the head has reached the sink.

use std::io;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Sink;
use crate::mode;

/// Check if `status` may carry a response body.
///
/// Informational responses, 204 and 304 never do.
pub fn body_allowed_for_status(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

/// Per-request response state over a byte sink.
pub struct ResponseWriter {
    sink: Option<Box<dyn Sink>>,
    headers: HeaderMap,
    status: StatusCode,
    // None until the head is emitted
    size: Option<usize>,
    client_gone: CancellationToken,
}

impl ResponseWriter {
    /// Wrap `sink`. `client_gone` is cancelled by the transport when the peer disconnects.
    pub fn new(sink: Box<dyn Sink>, client_gone: CancellationToken) -> Self {
        Self {
            sink: Some(sink),
            headers: HeaderMap::new(),
            status: StatusCode::OK,
            size: None,
            client_gone,
        }
    }

    /// Writer with no sink attached. Every write fails with `NotConnected`.
    pub fn detached() -> Self {
        Self {
            sink: None,
            headers: HeaderMap::new(),
            status: StatusCode::OK,
            size: None,
            client_gone: CancellationToken::new(),
        }
    }

    /// Snapshot of the current state with the sink removed.
    pub(crate) fn snapshot(&self) -> Self {
        Self {
            sink: None,
            headers: self.headers.clone(),
            status: self.status,
            size: self.size,
            client_gone: self.client_gone.clone(),
        }
    }

    pub(crate) fn reset(&mut self, sink: Box<dyn Sink>, client_gone: CancellationToken) {
        self.sink = Some(sink);
        self.headers.clear();
        self.status = StatusCode::OK;
        self.size = None;
        self.client_gone = client_gone;
    }

    /// Drop the sink and clear all state.
    pub(crate) fn release(&mut self) {
        self.sink = None;
        self.headers.clear();
        self.status = StatusCode::OK;
        self.size = None;
        self.client_gone = CancellationToken::new();
    }

    /// Set the pending status.
    ///
    /// Ignored once the head is written; in debug mode the override attempt is logged.
    pub fn set_status(&mut self, status: StatusCode) {
        if status == self.status {
            return;
        }
        if self.written() {
            if mode::is_debugging() {
                warn!(
                    current = self.status.as_u16(),
                    attempted = status.as_u16(),
                    "headers were already written, status code override ignored"
                );
            }
            return;
        }
        self.status = status;
    }

    /// Current status. Frozen after the head is written.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Pending response headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the pending response headers.
    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header by string name. An empty value deletes the header.
    ///
    /// Invalid names or values are dropped with a debug log.
    pub fn set_header(&mut self, key: &str, value: &str) {
        let name = match HeaderName::try_from(key) {
            Ok(name) => name,
            Err(e) => {
                debug!(key, error = %e, "invalid header name");
                return;
            }
        };
        if value.is_empty() {
            self.headers.remove(&name);
            return;
        }
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(e) => debug!(key, error = %e, "invalid header value"),
        }
    }

    /// Check if the head has been emitted.
    #[inline]
    pub fn written(&self) -> bool {
        self.size.is_some()
    }

    /// Body bytes written, or `None` before the head is emitted.
    #[inline]
    pub fn size(&self) -> Option<usize> {
        self.size
    }

    /// Check if this writer still has a sink.
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    /// Emit the head now if it has not been emitted yet.
    ///
    /// Sink failures are not reported here; the next body write surfaces them.
    pub fn write_header_now(&mut self) {
        if self.written() {
            return;
        }
        self.size = Some(0);
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write_head(self.status, &self.headers) {
                debug!(error = %e, "failed to write response head");
            }
        }
    }

    /// Write a body chunk, emitting the head first if needed.
    pub fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write_header_now();
        let sink = self.sink.as_mut().ok_or_else(not_connected)?;
        let n = sink.write_body(data)?;
        self.size = Some(self.size.unwrap_or(0) + n);
        Ok(n)
    }

    /// Write a string body chunk.
    pub fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.write_bytes(s.as_bytes())
    }

    /// Flush the sink, emitting the head first if needed.
    pub fn flush_sink(&mut self) -> io::Result<()> {
        self.write_header_now();
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Err(not_connected()),
        }
    }

    /// Check if the transport reported the client as gone.
    #[inline]
    pub fn client_gone(&self) -> bool {
        self.client_gone.is_cancelled()
    }

    /// Token cancelled when the client disconnects.
    #[inline]
    pub fn client_gone_token(&self) -> &CancellationToken {
        &self.client_gone
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_sink()
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "response sink is detached")
}
