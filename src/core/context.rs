//! Per-request context driven through a handler chain.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::header;
use http::StatusCode;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::errors::{ErrorList, RecordedError};
use super::handler::{empty_chain, Handler, HandlersChain};
use super::writer::body_allowed_for_status;
use super::{Error, Params, Request, ResponseWriter, Result, Sink};
use crate::render::{self, HtmlRender, Render};

/// Cursor value meaning "no further handlers may run".
///
/// Chains must stay strictly shorter than this, which route registration enforces.
pub const ABORT_INDEX: i8 = i8::MAX / 2;

/// Type-erased scratch value. Shared, never mutated in place.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Engine settings a context needs while serving a request.
#[derive(Clone, Default)]
pub struct ContextConfig {
    /// Trust `X-Forwarded-For` / `X-Real-Ip` in [`Context::client_ip`].
    pub forwarded_by_client_ip: bool,
    /// Template engine for [`Context::html`].
    pub html: Option<Arc<dyn HtmlRender>>,
}

static EMPTY_REQUEST: LazyLock<Arc<Request>> = LazyLock::new(|| Arc::new(Request::default()));

/// State of one in-flight request.
///
/// A context is exclusively owned by the task processing its request. Use
/// [`Context::copy`] to hand a snapshot to another task.
pub struct Context {
    request: Arc<Request>,
    writer: ResponseWriter,
    params: Params,
    handlers: HandlersChain,
    index: i8,
    full_path: String,
    keys: Option<HashMap<String, Value>>,
    errors: ErrorList,
    pub(super) accepted: Option<Vec<String>>,
    query_cache: Option<Vec<(String, String)>>,
    config: Arc<ContextConfig>,
}

impl Context {
    /// Create a context for `request` writing into `sink`, with default settings.
    pub fn new(request: Request, sink: Box<dyn Sink>) -> Self {
        let mut ctx = Self::idle(Arc::new(ContextConfig::default()));
        ctx.prepare(request, sink, CancellationToken::new());
        ctx
    }

    /// Context holding no request, ready to be pooled.
    pub(crate) fn idle(config: Arc<ContextConfig>) -> Self {
        Self {
            request: Arc::clone(&EMPTY_REQUEST),
            writer: ResponseWriter::detached(),
            params: Params::new(),
            handlers: empty_chain(),
            index: -1,
            full_path: String::new(),
            keys: None,
            errors: ErrorList::default(),
            accepted: None,
            query_cache: None,
            config,
        }
    }

    /// Bind a fresh request and sink to a reset context.
    pub(crate) fn prepare(
        &mut self,
        request: Request,
        sink: Box<dyn Sink>,
        client_gone: CancellationToken,
    ) {
        self.request = Arc::new(request);
        self.writer.reset(sink, client_gone);
    }

    /// Install the matched route.
    pub(crate) fn set_route(&mut self, handlers: HandlersChain, params: Params, full_path: &str) {
        self.handlers = handlers;
        self.params = params;
        self.full_path.clear();
        self.full_path.push_str(full_path);
    }

    /// Clear every per-request field.
    ///
    /// Must cover all mutable state; pooled contexts are reused across requests.
    pub(crate) fn reset(&mut self) {
        self.request = Arc::clone(&EMPTY_REQUEST);
        self.writer.release();
        self.params.clear();
        self.handlers = empty_chain();
        self.index = -1;
        self.full_path.clear();
        self.keys = None;
        self.errors.clear();
        self.accepted = None;
        self.query_cache = None;
    }

    // ---- flow control ----

    /// Run the remaining handlers in order.
    ///
    /// Called by the engine to start a chain, and by middleware to run the rest
    /// of the chain before doing post-processing. The first `Err` stops the
    /// chain and is returned unchanged.
    pub fn next(&mut self) -> Result<()> {
        let handlers = Arc::clone(&self.handlers);
        self.index = self.index.saturating_add(1);
        while let Some(handler) = usize::try_from(self.index)
            .ok()
            .and_then(|i| handlers.get(i))
        {
            handler.call(self)?;
            self.index = self.index.saturating_add(1);
        }
        Ok(())
    }

    /// Check if the chain was aborted.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    /// Prevent pending handlers from running.
    ///
    /// The current handler keeps running.
    #[inline]
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    /// Abort and emit the head with `code`.
    pub fn abort_with_status(&mut self, code: StatusCode) {
        self.status(code);
        self.writer.write_header_now();
        self.abort();
    }

    /// Abort and render `body` as JSON with `code`.
    pub fn abort_with_status_json<T: Serialize + ?Sized>(
        &mut self,
        code: StatusCode,
        body: &T,
    ) -> Result<()> {
        self.abort();
        self.json(code, body)
    }

    /// Abort with `code` and record `err`.
    pub fn abort_with_error(
        &mut self,
        code: StatusCode,
        err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> &mut RecordedError {
        self.abort_with_status(code);
        self.error(err)
    }

    /// Record a request-time error without stopping the chain.
    pub fn error(
        &mut self,
        err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> &mut RecordedError {
        self.errors.push(RecordedError::new(err))
    }

    /// Errors recorded so far.
    #[inline]
    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    /// Last handler of the chain, normally the route's main handler.
    pub fn handler(&self) -> Option<&Handler> {
        self.handlers.last()
    }

    /// Name of the main handler, or `""` without a chain.
    pub fn handler_name(&self) -> &'static str {
        self.handler().map(Handler::name).unwrap_or("")
    }

    /// Names of every handler in the chain, in order.
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(Handler::name).collect()
    }

    /// Route pattern that matched, or `""` when unmatched.
    #[inline]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Snapshot safe to move to another task.
    ///
    /// Scratch values are shared with the original. The copy has no handlers,
    /// is already aborted and its writer has no sink.
    pub fn copy(&self) -> Context {
        Context {
            request: Arc::clone(&self.request),
            writer: self.writer.snapshot(),
            params: self.params.clone(),
            handlers: empty_chain(),
            index: ABORT_INDEX,
            full_path: self.full_path.clone(),
            keys: self.keys.clone(),
            errors: self.errors.clone(),
            accepted: self.accepted.clone(),
            query_cache: self.query_cache.clone(),
            config: Arc::clone(&self.config),
        }
    }

    // ---- scratch space ----

    /// Store `value` under `key`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.keys
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), Arc::new(value));
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.keys.as_ref()?.get(key).map(|v| v.as_ref())
    }

    /// Value stored under `key`, if it has type `T`.
    pub fn get_as<T: Any>(&self, key: &str) -> Option<&T> {
        self.get(key)?.downcast_ref::<T>()
    }

    /// Value stored under `key`, or [`Error::MissingKey`].
    pub fn must_get(&self, key: &str) -> Result<&(dyn Any + Send + Sync)> {
        self.get(key)
            .ok_or_else(|| Error::MissingKey(key.to_string()))
    }

    /// Typed [`Context::must_get`]. A value of another type is an error too.
    pub fn must_get_as<T: Any>(&self, key: &str) -> Result<&T> {
        self.must_get(key)?
            .downcast_ref::<T>()
            .ok_or_else(|| Error::Custom(format!("key \"{}\" holds a different type", key)))
    }

    fn get_or_default<T: Any + Clone + Default>(&self, key: &str) -> T {
        self.get_as::<T>(key).cloned().unwrap_or_default()
    }

    /// String under `key`; accepts `String` and `&'static str` values.
    pub fn get_string(&self, key: &str) -> String {
        let Some(value) = self.get(key) else {
            return String::new();
        };
        if let Some(s) = value.downcast_ref::<String>() {
            return s.clone();
        }
        value
            .downcast_ref::<&'static str>()
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get_or_default(key)
    }

    pub fn get_int(&self, key: &str) -> i32 {
        self.get_or_default(key)
    }

    pub fn get_int64(&self, key: &str) -> i64 {
        self.get_or_default(key)
    }

    pub fn get_float64(&self, key: &str) -> f64 {
        self.get_or_default(key)
    }

    /// Time under `key`, or the Unix epoch.
    pub fn get_time(&self, key: &str) -> SystemTime {
        self.get_as::<SystemTime>(key)
            .copied()
            .unwrap_or(UNIX_EPOCH)
    }

    pub fn get_duration(&self, key: &str) -> Duration {
        self.get_or_default(key)
    }

    pub fn get_string_slice(&self, key: &str) -> Vec<String> {
        self.get_or_default(key)
    }

    pub fn get_string_map(&self, key: &str) -> HashMap<String, serde_json::Value> {
        self.get_or_default(key)
    }

    pub fn get_string_map_string(&self, key: &str) -> HashMap<String, String> {
        self.get_or_default(key)
    }

    pub fn get_string_map_string_slice(&self, key: &str) -> HashMap<String, Vec<String>> {
        self.get_or_default(key)
    }

    // ---- request ----

    /// The inbound request.
    #[inline]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Path parameter `key`, or `""`.
    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).unwrap_or("")
    }

    #[inline]
    pub fn params(&self) -> &Params {
        &self.params
    }

    fn query_pairs(&mut self) -> &[(String, String)] {
        if self.query_cache.is_none() {
            self.query_cache = Some(self.request.query_pairs());
        }
        self.query_cache.as_deref().unwrap_or(&[])
    }

    /// First value of query parameter `key`, if present.
    pub fn get_query(&mut self, key: &str) -> Option<String> {
        self.query_pairs()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// First value of query parameter `key`, or `""`.
    pub fn query(&mut self, key: &str) -> String {
        self.get_query(key).unwrap_or_default()
    }

    /// Query parameter `key`, or `default` when absent.
    pub fn default_query(&mut self, key: &str, default: &str) -> String {
        self.get_query(key).unwrap_or_else(|| default.to_string())
    }

    /// Every value of query parameter `key`, in order.
    pub fn query_array(&mut self, key: &str) -> Vec<String> {
        self.query_pairs()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Request header `key`.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.request.header(key)
    }

    /// Request media type, without parameters.
    pub fn content_type(&self) -> &str {
        let raw = self.request.content_type().unwrap_or("");
        raw.split([';', ' ']).next().unwrap_or("")
    }

    /// Check if the client asked for a websocket upgrade.
    pub fn is_websocket(&self) -> bool {
        let connection = self.request.header(header::CONNECTION.as_str()).unwrap_or("");
        let upgrade = self.request.header(header::UPGRADE.as_str()).unwrap_or("");
        connection.to_ascii_lowercase().contains("upgrade") && upgrade.eq_ignore_ascii_case("websocket")
    }

    /// Best guess of the client address.
    ///
    /// Forwarding headers are consulted only when the engine trusts them.
    pub fn client_ip(&self) -> String {
        if self.config.forwarded_by_client_ip {
            let forwarded = self.request.header("x-forwarded-for").unwrap_or("");
            let first = forwarded.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return first.to_string();
            }
            let real_ip = self.request.header("x-real-ip").unwrap_or("").trim();
            if !real_ip.is_empty() {
                return real_ip.to_string();
            }
        }
        self.request
            .remote_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    /// Raw request body.
    #[inline]
    pub fn raw_data(&self) -> &Bytes {
        self.request.body()
    }

    // ---- response ----

    /// Set the response status.
    #[inline]
    pub fn status(&mut self, code: StatusCode) {
        self.writer.set_status(code);
    }

    /// Set a response header. An empty value deletes it.
    #[inline]
    pub fn set_header(&mut self, key: &str, value: &str) {
        self.writer.set_header(key, value);
    }

    #[inline]
    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    #[inline]
    pub fn writer_mut(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    /// Render `r` with `code`.
    ///
    /// Statuses without a body only get the content type and the head. A
    /// render failure aborts the chain and is returned.
    pub fn render<R: Render>(&mut self, code: StatusCode, r: &R) -> Result<()> {
        if !self.writer.is_attached() {
            return Err(Error::Detached);
        }
        self.status(code);
        if !body_allowed_for_status(code) {
            r.write_content_type(&mut self.writer);
            self.writer.write_header_now();
            return Ok(());
        }
        r.render(&mut self.writer).inspect_err(|_| self.abort())
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, body: &T) -> Result<()> {
        self.render(code, &render::Json(body))
    }

    pub fn string(&mut self, code: StatusCode, body: &str) -> Result<()> {
        self.render(code, &render::Text(body))
    }

    pub fn data(
        &mut self,
        code: StatusCode,
        content_type: &str,
        data: impl Into<Bytes>,
    ) -> Result<()> {
        self.render(
            code,
            &render::Data {
                content_type: content_type.to_string(),
                data: data.into(),
            },
        )
    }

    pub fn xml(&mut self, code: StatusCode, body: &serde_json::Value) -> Result<()> {
        self.render(code, &render::Xml(body))
    }

    /// Render template `name` through the configured [`HtmlRender`].
    pub fn html(&mut self, code: StatusCode, name: &str, data: &serde_json::Value) -> Result<()> {
        let engine = self
            .config
            .html
            .clone()
            .ok_or_else(|| Error::Render("no html renderer configured".into()))?;
        let page = engine.instance(name, data)?;
        self.render(code, &render::Html(page))
    }

    /// Redirect to `location`. `code` must be 3xx or 201.
    pub fn redirect(&mut self, code: StatusCode, location: &str) -> Result<()> {
        render::Redirect { code, location }
            .render(&mut self.writer)
            .inspect_err(|_| self.abort())
    }

    /// Drive a streamed response.
    ///
    /// `step` runs until it returns `false` or the client goes away; the sink
    /// is flushed after every step. Returns `true` if the client went away
    /// before the stream finished.
    pub fn stream<F>(&mut self, mut step: F) -> Result<bool>
    where
        F: FnMut(&mut ResponseWriter) -> bool,
    {
        if !self.writer.is_attached() {
            return Err(Error::Detached);
        }
        loop {
            if self.writer.client_gone() {
                return Ok(true);
            }
            let keep_open = step(&mut self.writer);
            if let Err(e) = self.writer.flush_sink() {
                if self.writer.client_gone() {
                    return Ok(true);
                }
                return Err(e.into());
            }
            if !keep_open {
                return Ok(false);
            }
        }
    }

    /// Check if the transport reported the client as gone.
    #[inline]
    pub fn client_gone(&self) -> bool {
        self.writer.client_gone()
    }

    // ---- cancellation compatibility ----

    /// Always `None`: requests carry no deadline.
    pub fn deadline(&self) -> Option<Instant> {
        None
    }

    /// Always `None`: use [`Context::client_gone`] to observe disconnects.
    pub fn done(&self) -> Option<CancellationToken> {
        None
    }

    /// Always `None`.
    pub fn err(&self) -> Option<&Error> {
        None
    }

    /// Scratch lookup under the cancellation-context name.
    pub fn value(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.get(key)
    }
}
