//! Route registration.
//!
//! [`Routes`] is the registration surface shared by the engine and its
//! [`RouterGroup`]s. Groups compose path prefixes and middleware; every
//! registered route ends up as one flat `(method, path, chain)` entry in the
//! [`RouteTable`].

mod group;
mod router;

pub use group::RouterGroup;
pub use router::{ExactRouter, RouteMatch, Router};

use std::sync::LazyLock;

use http::Method;
use regex::Regex;
use tracing::debug;

use crate::core::{Error, Handler, HandlersChain, Result, ABORT_INDEX};
use crate::mode;
use crate::path::join_paths;

/// Methods registered by [`Routes::any`].
pub const ANY_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
    Method::DELETE,
    Method::CONNECT,
    Method::TRACE,
];

static METHOD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Z]+$").expect("method pattern compiles"));

/// Parse a route method. Only uppercase ASCII letters are accepted.
pub fn parse_method(method: &str) -> Result<Method> {
    if !METHOD_PATTERN.is_match(method) {
        return Err(Error::InvalidMethod(method.to_string()));
    }
    Method::from_bytes(method.as_bytes()).map_err(|_| Error::InvalidMethod(method.to_string()))
}

/// Concatenate `base` and `extra`, keeping the result below the abort index.
pub fn combine_handlers(
    base: &[Handler],
    extra: impl IntoIterator<Item = Handler>,
) -> Result<Vec<Handler>> {
    let mut merged = base.to_vec();
    merged.extend(extra);
    if merged.len() >= ABORT_INDEX as usize {
        return Err(Error::TooManyHandlers { len: merged.len() });
    }
    Ok(merged)
}

/// One registered route.
#[derive(Clone, Debug)]
pub struct RouteInfo {
    pub method: Method,
    pub path: String,
    /// Name of the last handler in the chain.
    pub handler: &'static str,
    pub handlers: HandlersChain,
}

/// Flat list of registered routes over a [`Router`].
pub struct RouteTable {
    router: Box<dyn Router>,
    routes: Vec<RouteInfo>,
}

impl RouteTable {
    pub fn new(router: Box<dyn Router>) -> Self {
        Self {
            router,
            routes: Vec::new(),
        }
    }

    /// Register a complete chain under an absolute path.
    pub fn add(&mut self, method: Method, path: String, handlers: Vec<Handler>) -> Result<()> {
        let handlers: HandlersChain = handlers.into();
        self.router.add(&method, &path, handlers.clone())?;

        let handler = handlers.last().map(Handler::name).unwrap_or("");
        if mode::is_debugging() {
            debug!(
                "{:<6} {:<25} --> {} ({} handlers)",
                method.as_str(),
                path,
                handler,
                handlers.len()
            );
        }
        self.routes.push(RouteInfo {
            method,
            path,
            handler,
            handlers,
        });
        Ok(())
    }

    /// Register one chain under several methods, all or nothing.
    ///
    /// Every method is checked against the registered routes before the
    /// first one is added.
    pub fn add_all(&mut self, methods: &[Method], path: String, handlers: Vec<Handler>) -> Result<()> {
        if let Some(taken) = methods.iter().find(|m| self.contains(m, &path)) {
            return Err(Error::DuplicateRoute {
                method: taken.to_string(),
                path,
            });
        }
        for method in methods {
            self.add(method.clone(), path.clone(), handlers.clone())?;
        }
        Ok(())
    }

    fn contains(&self, method: &Method, path: &str) -> bool {
        self.routes.iter().any(|r| &r.method == method && r.path == path)
    }

    pub fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(Box::new(ExactRouter::new()))
    }
}

/// Route registration surface.
///
/// `relative` paths are joined onto [`Routes::base_path`] and the given
/// handlers are appended to [`Routes::middleware`], parent handlers first.
pub trait Routes {
    /// Absolute prefix of this group.
    fn base_path(&self) -> &str;

    /// Middleware every route of this group runs first.
    fn middleware(&self) -> &[Handler];

    #[doc(hidden)]
    fn middleware_mut(&mut self) -> &mut Vec<Handler>;

    #[doc(hidden)]
    fn table_mut(&mut self) -> &mut RouteTable;

    /// Append middleware for routes registered afterwards on this group.
    fn use_middleware(&mut self, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.middleware_mut().extend(handlers);
        self
    }

    /// Child group under `relative`, inheriting this group's middleware.
    fn group(
        &mut self,
        relative: &str,
        handlers: impl IntoIterator<Item = Handler>,
    ) -> Result<RouterGroup<'_>> {
        let handlers = combine_handlers(self.middleware(), handlers)?;
        let base_path = join_paths(self.base_path(), relative);
        Ok(RouterGroup::new(self.table_mut(), handlers, base_path))
    }

    /// Register `handlers` for `method` (uppercase letters only).
    fn handle(
        &mut self,
        method: &str,
        relative: &str,
        handlers: impl IntoIterator<Item = Handler>,
    ) -> Result<&mut Self> {
        let method = parse_method(method)?;
        self.route(method, relative, handlers)
    }

    /// Register `handlers` for an already parsed method.
    fn route(
        &mut self,
        method: Method,
        relative: &str,
        handlers: impl IntoIterator<Item = Handler>,
    ) -> Result<&mut Self> {
        let path = join_paths(self.base_path(), relative);
        let chain = combine_handlers(self.middleware(), handlers)?;
        self.table_mut().add(method, path, chain)?;
        Ok(self)
    }

    fn get(&mut self, relative: &str, handlers: impl IntoIterator<Item = Handler>) -> Result<&mut Self> {
        self.route(Method::GET, relative, handlers)
    }

    fn post(&mut self, relative: &str, handlers: impl IntoIterator<Item = Handler>) -> Result<&mut Self> {
        self.route(Method::POST, relative, handlers)
    }

    fn put(&mut self, relative: &str, handlers: impl IntoIterator<Item = Handler>) -> Result<&mut Self> {
        self.route(Method::PUT, relative, handlers)
    }

    fn patch(&mut self, relative: &str, handlers: impl IntoIterator<Item = Handler>) -> Result<&mut Self> {
        self.route(Method::PATCH, relative, handlers)
    }

    fn delete(&mut self, relative: &str, handlers: impl IntoIterator<Item = Handler>) -> Result<&mut Self> {
        self.route(Method::DELETE, relative, handlers)
    }

    fn head(&mut self, relative: &str, handlers: impl IntoIterator<Item = Handler>) -> Result<&mut Self> {
        self.route(Method::HEAD, relative, handlers)
    }

    fn options(&mut self, relative: &str, handlers: impl IntoIterator<Item = Handler>) -> Result<&mut Self> {
        self.route(Method::OPTIONS, relative, handlers)
    }

    /// Register `handlers` for every method in [`ANY_METHODS`].
    ///
    /// Fails without registering anything if one of them is already taken.
    fn any(&mut self, relative: &str, handlers: impl IntoIterator<Item = Handler>) -> Result<&mut Self> {
        let path = join_paths(self.base_path(), relative);
        let chain = combine_handlers(self.middleware(), handlers)?;
        self.table_mut().add_all(&ANY_METHODS, path, chain)?;
        Ok(self)
    }
}
