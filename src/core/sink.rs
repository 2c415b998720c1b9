//! Response sinks: where a [`ResponseWriter`](super::ResponseWriter) sends bytes.
//!
//! A sink receives the response head exactly once, then any number of body
//! chunks. The hyper server uses a channel-backed sink; tests and
//! [`Engine::serve`](crate::Engine::serve) use [`BufferSink`].

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::BytesMut;
use http::{HeaderMap, StatusCode};

use super::Response;

/// Destination of one response.
pub trait Sink: Send {
    /// Emit the status line and headers.
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()>;

    /// Emit a body chunk, returning the number of bytes accepted.
    fn write_body(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Push buffered data to the client.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Buffered {
    head: Option<(StatusCode, HeaderMap)>,
    body: BytesMut,
}

/// In-memory sink.
///
/// Clones share the same buffer, so one clone can be handed to the writer
/// while another collects the result.
#[derive(Clone, Debug, Default)]
pub struct BufferSink {
    inner: Arc<Mutex<Buffered>>,
}

impl BufferSink {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buffered> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if the head has been emitted.
    pub fn head_written(&self) -> bool {
        self.lock().head.is_some()
    }

    /// Status emitted so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.lock().head.as_ref().map(|(status, _)| *status)
    }

    /// Copy of the body written so far.
    pub fn body(&self) -> Vec<u8> {
        self.lock().body.to_vec()
    }

    /// Take the collected response, leaving the buffer empty.
    ///
    /// A response whose head was never emitted reports 200 with no headers.
    pub fn take_response(&self) -> Response {
        let mut inner = self.lock();
        let (status, headers) = inner
            .head
            .take()
            .unwrap_or((StatusCode::OK, HeaderMap::new()));
        let body = std::mem::take(&mut inner.body).freeze();
        Response::from_parts(status, headers, body)
    }
}

impl Sink for BufferSink {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        let mut inner = self.lock();
        if inner.head.is_none() {
            inner.head = Some((status, headers.clone()));
        }
        Ok(())
    }

    fn write_body(&mut self, data: &[u8]) -> io::Result<usize> {
        self.lock().body.extend_from_slice(data);
        Ok(data.len())
    }
}
