//! Channel-backed sink feeding a streaming hyper body.
//!
//! The chain runs on a blocking thread and writes through [`ChannelSink`];
//! the connection task awaits the head and streams body chunks as they
//! arrive.

use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::StreamExt;
use http::{HeaderMap, StatusCode};
use hyper::body::Frame;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::core::Sink;

/// Status line and headers sent ahead of the body.
pub type Head = (StatusCode, HeaderMap);

/// Sink writing into channels read by the connection task.
///
/// Any failed send means the client is gone: the client-gone token is
/// cancelled and the write fails with `BrokenPipe`.
pub struct ChannelSink {
    head: Option<oneshot::Sender<Head>>,
    body: mpsc::Sender<Bytes>,
    client_gone: CancellationToken,
}

/// Connection-side ends of a [`ChannelSink`].
pub struct ChannelReceivers {
    pub head: oneshot::Receiver<Head>,
    pub body: mpsc::Receiver<Bytes>,
}

impl ChannelSink {
    /// Create a sink and its receivers. `buffer` bounds queued body chunks.
    pub fn new(buffer: usize, client_gone: CancellationToken) -> (Self, ChannelReceivers) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(buffer.max(1));
        let sink = Self {
            head: Some(head_tx),
            body: body_tx,
            client_gone,
        };
        (
            sink,
            ChannelReceivers {
                head: head_rx,
                body: body_rx,
            },
        )
    }

    fn gone(&self) -> io::Error {
        self.client_gone.cancel();
        io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")
    }
}

impl Sink for ChannelSink {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        match self.head.take() {
            Some(tx) => tx.send((status, headers.clone())).map_err(|_| self.gone()),
            None => Ok(()),
        }
    }

    fn write_body(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        // must not be called from an async context
        self.body
            .blocking_send(Bytes::copy_from_slice(data))
            .map_err(|_| self.gone())?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.body.is_closed() {
            return Err(self.gone());
        }
        Ok(())
    }
}

/// Body chunks as hyper frames.
///
/// Dropping the stream, which hyper does when the client goes away,
/// cancels the client-gone token.
pub struct ChunkFrameStream {
    inner: ReceiverStream<Bytes>,
    _client_gone: DropGuard,
}

impl ChunkFrameStream {
    pub fn new(rx: mpsc::Receiver<Bytes>, client_gone: CancellationToken) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
            _client_gone: client_gone.drop_guard(),
        }
    }
}

impl Stream for ChunkFrameStream {
    type Item = Result<Frame<Bytes>, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner
            .poll_next_unpin(cx)
            .map(|chunk| chunk.map(|data| Ok(Frame::data(data))))
    }
}
