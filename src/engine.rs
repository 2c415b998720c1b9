//! Engine: route registration plus per-request dispatch.

use std::sync::Arc;

use http::{header, HeaderValue, Method, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::EngineConfig;
use crate::core::{
    empty_chain, BufferSink, Context, ContextConfig, Error, Handler, HandlersChain, Params,
    Request, Response, Sink,
};
use crate::middleware::{logger, recovery};
use crate::mode;
use crate::path::clean_path;
use crate::pool::ContextPool;
use crate::render::HtmlRender;
use crate::routing::{combine_handlers, RouteInfo, RouteTable, Router, Routes};

const DEFAULT_404_BODY: &[u8] = b"404 page not found";
static PLAIN_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("text/plain");

/// Request engine.
///
/// Register routes through [`Routes`], then dispatch requests with
/// [`Engine::serve`] or [`Engine::serve_with_sink`]. Dispatch takes `&self`,
/// so a built engine can be shared between threads.
pub struct Engine {
    middleware: Vec<Handler>,
    table: RouteTable,
    no_route: Vec<Handler>,
    all_no_route: HandlersChain,
    /// Length of a not-found chain that would reach the abort index.
    no_route_overflow: Option<usize>,
    redirect_fixed_path: bool,
    pool_size: usize,
    settings: ContextConfig,
    pool: ContextPool,
}

impl Engine {
    /// Engine without middleware, using the [`ExactRouter`](crate::routing::ExactRouter).
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_router(config, RouteTable::default())
    }

    /// Engine with the access logger and recovery installed.
    pub fn with_default_middleware(config: &EngineConfig) -> Self {
        let mut engine = Self::new(config);
        engine.use_middleware([logger(), recovery()]);
        engine
    }

    /// Engine over a custom route table.
    pub fn with_router(config: &EngineConfig, table: RouteTable) -> Self {
        if mode::is_debugging() {
            warn!("running in debug mode, switch to release mode in production");
        }
        let settings = ContextConfig {
            forwarded_by_client_ip: config.forwarded_by_client_ip,
            html: None,
        };
        Self {
            middleware: Vec::new(),
            table,
            no_route: Vec::new(),
            all_no_route: empty_chain(),
            no_route_overflow: None,
            redirect_fixed_path: config.redirect_fixed_path,
            pool_size: config.pool_size,
            pool: ContextPool::new(config.pool_size, Arc::new(settings.clone())),
            settings,
        }
    }

    /// Engine over a custom [`Router`].
    pub fn with_custom_router(config: &EngineConfig, router: Box<dyn Router>) -> Self {
        Self::with_router(config, RouteTable::new(router))
    }

    /// Handlers run when no route matches, after the root middleware.
    pub fn no_route(&mut self, handlers: impl IntoIterator<Item = Handler>) -> crate::core::Result<()> {
        self.no_route = handlers.into_iter().collect();
        self.rebuild_no_route()
    }

    fn rebuild_no_route(&mut self) -> crate::core::Result<()> {
        match combine_handlers(&self.middleware, self.no_route.iter().cloned()) {
            Ok(chain) => {
                self.all_no_route = chain.into();
                self.no_route_overflow = None;
                Ok(())
            }
            Err(e) => {
                self.all_no_route = empty_chain();
                self.no_route_overflow = Some(self.middleware.len() + self.no_route.len());
                Err(e)
            }
        }
    }

    /// Check the setup that registration could not report.
    ///
    /// [`Routes::use_middleware`] cannot fail, so a root middleware list that
    /// pushes the not-found chain past the handler limit is reported here.
    /// Until fixed, unmatched requests are answered with 500.
    pub fn validate(&self) -> crate::core::Result<()> {
        match self.no_route_overflow {
            Some(len) => Err(Error::TooManyHandlers { len }),
            None => Ok(()),
        }
    }

    /// Template engine used by [`Context::html`].
    pub fn set_html_renderer(&mut self, renderer: Arc<dyn HtmlRender>) {
        self.settings.html = Some(renderer);
        self.pool = ContextPool::new(self.pool_size, Arc::new(self.settings.clone()));
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> &[RouteInfo] {
        self.table.routes()
    }

    /// Contexts currently idle in the pool.
    pub fn idle_contexts(&self) -> usize {
        self.pool.idle_count()
    }

    /// Dispatch `request` and collect the response in memory.
    pub fn serve(&self, request: Request) -> Response {
        let sink = BufferSink::new();
        self.serve_with_sink(request, Box::new(sink.clone()), CancellationToken::new());
        sink.take_response()
    }

    /// Dispatch `request`, writing the response into `sink`.
    ///
    /// `client_gone` should be cancelled by the transport when the client disconnects.
    pub fn serve_with_sink(
        &self,
        request: Request,
        sink: Box<dyn Sink>,
        client_gone: CancellationToken,
    ) {
        let mut ctx = self.pool.acquire(request, sink, client_gone);
        self.handle_request(&mut ctx);
        self.pool.release(ctx);
    }

    fn handle_request(&self, ctx: &mut Context) {
        let method = ctx.request().method().clone();
        let path = ctx.request().path().to_string();

        if let Some(found) = self.table.router().find(&method, &path) {
            ctx.set_route(found.handlers, found.params, &found.full_path);
            self.run_chain(ctx);
            ctx.writer_mut().write_header_now();
            return;
        }

        if self.redirect_fixed_path
            && method != Method::CONNECT
            && path != "/"
            && self.redirect_fixed(ctx, &method, &path)
        {
            return;
        }

        if let Err(e) = self.validate() {
            error!(path = %path, error = %e, "not-found chain is invalid");
            ctx.status(StatusCode::INTERNAL_SERVER_ERROR);
            ctx.writer_mut().write_header_now();
            return;
        }

        ctx.set_route(Arc::clone(&self.all_no_route), Params::new(), "");
        ctx.status(StatusCode::NOT_FOUND);
        self.run_chain(ctx);
        if ctx.writer().written() {
            return;
        }
        if ctx.writer().status() == StatusCode::NOT_FOUND {
            ctx.writer_mut()
                .headers_mut()
                .insert(header::CONTENT_TYPE, PLAIN_CONTENT_TYPE.clone());
            if let Err(e) = ctx.writer_mut().write_bytes(DEFAULT_404_BODY) {
                debug!(error = %e, "cannot write 404 body");
            }
        }
        ctx.writer_mut().write_header_now();
    }

    fn redirect_fixed(&self, ctx: &mut Context, method: &Method, path: &str) -> bool {
        let fixed = clean_path(path);
        if fixed == path || self.table.router().find(method, &fixed).is_none() {
            return false;
        }

        let code = if *method == Method::GET {
            StatusCode::MOVED_PERMANENTLY
        } else {
            StatusCode::TEMPORARY_REDIRECT
        };
        let location = match ctx.request().query() {
            Some(query) => format!("{}?{}", fixed, query),
            None => fixed.into_owned(),
        };
        debug!(status = code.as_u16(), from = path, to = %location, "redirecting request");
        if let Err(e) = ctx.redirect(code, &location) {
            debug!(error = %e, "redirect failed");
        }
        ctx.writer_mut().write_header_now();
        true
    }

    /// Drive the chain. The head is left pending so callers can still
    /// decide on a default body.
    fn run_chain(&self, ctx: &mut Context) {
        if let Err(e) = ctx.next() {
            error!(
                method = %ctx.request().method(),
                path = ctx.request().path(),
                handler = ctx.handler_name(),
                error = %e,
                "handler chain failed"
            );
            if !ctx.writer().written() {
                ctx.status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Routes for Engine {
    fn base_path(&self) -> &str {
        "/"
    }

    fn middleware(&self) -> &[Handler] {
        &self.middleware
    }

    fn middleware_mut(&mut self) -> &mut Vec<Handler> {
        &mut self.middleware
    }

    fn table_mut(&mut self) -> &mut RouteTable {
        &mut self.table
    }

    fn use_middleware(&mut self, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.middleware.extend(handlers);
        if let Err(e) = self.rebuild_no_route() {
            error!(error = %e, "root middleware pushes the not-found chain past the handler limit");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handler;
    use bytes::Bytes;
    use std::sync::Mutex;

    fn get(uri: &str) -> Request {
        request(Method::GET, uri)
    }

    fn request(method: Method, uri: &str) -> Request {
        Request::from(
            http::Request::builder()
                .method(method)
                .uri(uri)
                .body(Bytes::new())
                .unwrap(),
        )
    }

    fn text(body: &'static str) -> Handler {
        handler(move |c: &mut Context| c.string(StatusCode::OK, body))
    }

    #[test]
    fn test_serve_matched_route() {
        let mut engine = Engine::default();
        engine.get("/hello", [text("hi")]).unwrap();

        let res = engine.serve(get("/hello"));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text(), "hi");
    }

    #[test]
    fn test_handler_without_output_flushes_200() {
        let mut engine = Engine::default();
        engine.get("/noop", [handler(|_| Ok(()))]).unwrap();
        let res = engine.serve(get("/noop"));
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_not_found_default_body() {
        let engine = Engine::default();
        let res = engine.serve(get("/missing"));
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.content_type(), Some("text/plain"));
        assert_eq!(res.text(), "404 page not found");
    }

    #[test]
    fn test_no_route_handlers_run_after_middleware() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut engine = Engine::default();
        let s = Arc::clone(&seen);
        engine.use_middleware([handler(move |c: &mut Context| {
            s.lock().unwrap().push("mw");
            c.next()
        })]);
        engine
            .no_route([handler(|c: &mut Context| {
                c.json(StatusCode::NOT_FOUND, &serde_json::json!({"error": "nope"}))
            })])
            .unwrap();

        let res = engine.serve(get("/missing"));
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.text(), r#"{"error":"nope"}"#);
        assert_eq!(*seen.lock().unwrap(), vec!["mw"]);
    }

    #[test]
    fn test_no_route_default_body_after_middleware() {
        let mut engine = Engine::default();
        engine.use_middleware([handler(|c: &mut Context| c.next())]);
        let res = engine.serve(get("/missing"));
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.content_type(), Some("text/plain"));
        assert_eq!(res.text(), "404 page not found");
    }

    #[test]
    fn test_middleware_overflow_is_reported() {
        let mut engine = Engine::default();
        engine.use_middleware((0..63).map(|_| handler(|c: &mut Context| c.next())));
        assert!(matches!(
            engine.validate(),
            Err(Error::TooManyHandlers { len: 63 })
        ));
        assert!(matches!(
            engine.no_route([text("custom")]),
            Err(Error::TooManyHandlers { len: 64 })
        ));

        let res = engine.serve(get("/missing"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_no_route_status_override_skips_default_body() {
        let mut engine = Engine::default();
        engine
            .no_route([handler(|c: &mut Context| {
                c.status(StatusCode::GONE);
                Ok(())
            })])
            .unwrap();
        let res = engine.serve(get("/missing"));
        assert_eq!(res.status(), StatusCode::GONE);
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_redirect_fixed_path() {
        let mut engine = Engine::default();
        engine.get("/a/b", [text("ok")]).unwrap();
        engine.post("/a/b", [text("ok")]).unwrap();

        let res = engine.serve(get("/a//x/../b?q=1"));
        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.header("location"), Some("/a/b?q=1"));

        let res = engine.serve(request(Method::POST, "/a/./b"));
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.header("location"), Some("/a/b"));
    }

    #[test]
    fn test_redirect_disabled() {
        let config = EngineConfig {
            redirect_fixed_path: false,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(&config);
        engine.get("/a/b", [text("ok")]).unwrap();
        assert_eq!(
            engine.serve(get("/a//b")).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_chain_error_without_recovery_answers_500() {
        let mut engine = Engine::default();
        engine
            .get("/fail", [handler(|c: &mut Context| c.must_get("missing").map(|_| ()))])
            .unwrap();
        let res = engine.serve(get("/fail"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_chain_error_after_write_keeps_response() {
        let mut engine = Engine::default();
        engine
            .get(
                "/partial",
                [handler(|c: &mut Context| {
                    c.string(StatusCode::OK, "partial")?;
                    Err(Error::Custom("late failure".into()))
                })],
            )
            .unwrap();
        let res = engine.serve(get("/partial"));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text(), "partial");
    }

    #[test]
    fn test_contexts_are_recycled_clean() {
        let mut engine = Engine::default();
        engine
            .get(
                "/set",
                [handler(|c: &mut Context| {
                    c.set("leak", "value");
                    c.string(StatusCode::OK, "set")
                })],
            )
            .unwrap();
        engine
            .get(
                "/read",
                [handler(|c: &mut Context| {
                    let seen = c.get_string("leak");
                    c.string(StatusCode::OK, &seen)
                })],
            )
            .unwrap();

        engine.serve(get("/set"));
        assert_eq!(engine.idle_contexts(), 1);
        let res = engine.serve(get("/read"));
        assert_eq!(res.text(), "");
    }

    #[test]
    fn test_full_path_and_routes_listing() {
        let mut engine = Engine::default();
        engine
            .group("/api", [])
            .unwrap()
            .get(
                "/users",
                [handler(|c: &mut Context| {
                    let path = c.full_path().to_string();
                    c.string(StatusCode::OK, &path)
                })],
            )
            .unwrap();

        assert_eq!(engine.serve(get("/api/users")).text(), "/api/users");
        let routes = engine.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].method, Method::GET);
        assert_eq!(routes[0].path, "/api/users");
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
