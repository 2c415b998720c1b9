//! HTTP server driving an [`Engine`].
//!
//! Connections are served by hyper (HTTP/1.1 and HTTP/2 with automatic
//! detection). Each request's chain runs on tokio's blocking pool, writing
//! through a [`ChannelSink`] so the response streams while handlers work.
//!
//! # Graceful Shutdown
//!
//! ```rust,ignore
//! server.trigger_shutdown();
//! server.wait_for_drain(server.drain_timeout()).await;
//! ```

mod sink;

pub use sink::{ChannelReceivers, ChannelSink, ChunkFrameStream, Head};

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::core::Request;
use crate::Engine;

/// Response body handed to hyper.
pub type RelayBody = UnsyncBoxBody<Bytes, Infallible>;

/// Default capacity of the per-request body channel.
pub const DEFAULT_STREAM_BUFFER: usize = 16;

const BAD_REQUEST_BODY: &[u8] = b"400 bad request";
const INTERNAL_ERROR_BODY: &[u8] = b"500 internal server error";

/// Check if an error is a common connection reset or timeout.
#[inline]
fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
        || err_str.contains("timed out")
        || err_str.contains("HeaderTimeout")
}

/// HTTP server.
pub struct Server {
    config: ServerConfig,
    engine: Arc<Engine>,
    stream_buffer: usize,
    /// Active connections counter
    active_connections: Arc<AtomicUsize>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    shutdown_initiated: AtomicBool,
}

impl Server {
    /// Create a server dispatching into `engine`.
    pub fn new(config: ServerConfig, engine: Engine) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            engine: Arc::new(engine),
            stream_buffer: DEFAULT_STREAM_BUFFER,
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            shutdown_rx,
            shutdown_initiated: AtomicBool::new(false),
        }
    }

    /// Set the per-request body channel capacity.
    pub fn with_stream_buffer(mut self, chunks: usize) -> Self {
        self.stream_buffer = chunks.max(1);
        self
    }

    /// The engine requests are dispatched into.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Get current active connections count.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Get the configured drain timeout.
    pub fn drain_timeout(&self) -> Duration {
        self.config.drain_timeout
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from `listener` until shutdown is triggered.
    pub async fn serve(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Server listening on http://{}", listener.local_addr()?);
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };
                    let _ = stream.set_nodelay(true);

                    let conn = Connection {
                        engine: Arc::clone(&self.engine),
                        stream_buffer: self.stream_buffer,
                        header_timeout: self.config.header_timeout,
                    };
                    let active = Arc::clone(&self.active_connections);
                    active.fetch_add(1, Ordering::Relaxed);
                    tokio::spawn(async move {
                        conn.serve(stream, remote_addr).await;
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                _ = shutdown_rx.changed() => {
                    debug!("Received shutdown signal, stopping accept loop");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Trigger graceful shutdown.
    /// Stops accepting; connections already open finish their requests.
    pub fn trigger_shutdown(&self) {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all active connections to drain.
    /// Returns true if drained successfully, false if timeout was reached.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(100);

        loop {
            let active = self.active_connections.load(Ordering::Relaxed);
            if active == 0 {
                return true;
            }

            if start.elapsed() >= timeout {
                warn!("Drain timeout reached with {} active connections", active);
                return false;
            }

            debug!("Waiting for {} connections to drain...", active);
            tokio::time::sleep(check_interval).await;
        }
    }
}

/// Per-connection state.
#[derive(Clone)]
struct Connection {
    engine: Arc<Engine>,
    stream_buffer: usize,
    header_timeout: Duration,
}

impl Connection {
    async fn serve(self, stream: TcpStream, remote_addr: SocketAddr) {
        let header_timeout = self.header_timeout;
        let service = service_fn(move |req| {
            let conn = self.clone();
            async move { Ok::<_, Infallible>(conn.handle(req, remote_addr).await) }
        });

        let io = TokioIo::new(stream);
        if let Err(err) = auto::Builder::new(TokioExecutor::new())
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(Some(header_timeout))
            .keep_alive(true)
            .http2()
            .max_concurrent_streams(250)
            .serve_connection(io, service)
            .await
        {
            let err_str = format!("{:?}", err);
            if !is_connection_error(&err_str) {
                debug!("Connection error: {:?}", err);
            }
        }
    }

    async fn handle(
        &self,
        req: hyper::Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> hyper::Response<RelayBody> {
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!("Failed to read request body: {}", e);
                return plain_response(StatusCode::BAD_REQUEST, BAD_REQUEST_BODY);
            }
        };
        let request =
            Request::from(http::Request::from_parts(parts, body)).with_remote_addr(remote_addr);

        let client_gone = CancellationToken::new();
        let (sink, receivers) = ChannelSink::new(self.stream_buffer, client_gone.clone());

        let engine = Arc::clone(&self.engine);
        let token = client_gone.clone();
        let task = tokio::task::spawn_blocking(move || {
            engine.serve_with_sink(request, Box::new(sink), token);
        });

        let ChannelReceivers { head, body } = receivers;
        match head.await {
            Ok((status, headers)) => {
                tokio::spawn(async move {
                    if let Err(e) = task.await {
                        error!("Request task failed after head: {}", e);
                    }
                });
                let stream = ChunkFrameStream::new(body, client_gone);
                let mut response = hyper::Response::new(StreamBody::new(stream).boxed_unsync());
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            Err(_) => {
                // the chain ended without emitting a head
                if let Err(e) = task.await {
                    error!("Request task failed: {}", e);
                }
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY)
            }
        }
    }
}

fn plain_response(status: StatusCode, body: &'static [u8]) -> hyper::Response<RelayBody> {
    let mut response = hyper::Response::new(Full::new(Bytes::from_static(body)).boxed_unsync());
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Resolve when the process receives ctrl-c.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
