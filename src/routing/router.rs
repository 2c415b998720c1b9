//! Router seam: turns a method and path into a handler chain.

use std::collections::HashMap;

use http::Method;

use crate::core::{Error, HandlersChain, Params, Result};

/// Result of a successful lookup.
#[derive(Clone, Debug)]
pub struct RouteMatch {
    pub handlers: HandlersChain,
    pub params: Params,
    /// Registered pattern that matched.
    pub full_path: String,
}

/// URL matcher used by the engine.
///
/// Implementations own the pattern syntax; the engine only passes absolute
/// paths and complete chains.
pub trait Router: Send + Sync {
    /// Register `handlers` for `method` and `path`.
    fn add(&mut self, method: &Method, path: &str, handlers: HandlersChain) -> Result<()>;

    /// Look up the chain for a request.
    fn find(&self, method: &Method, path: &str) -> Option<RouteMatch>;
}

/// Router matching paths literally. No parameters are extracted.
#[derive(Default)]
pub struct ExactRouter {
    trees: HashMap<Method, HashMap<String, HandlersChain>>,
}

impl ExactRouter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Router for ExactRouter {
    fn add(&mut self, method: &Method, path: &str, handlers: HandlersChain) -> Result<()> {
        let tree = self.trees.entry(method.clone()).or_default();
        if tree.contains_key(path) {
            return Err(Error::DuplicateRoute {
                method: method.to_string(),
                path: path.to_string(),
            });
        }
        tree.insert(path.to_string(), handlers);
        Ok(())
    }

    fn find(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let (full_path, handlers) = self.trees.get(method)?.get_key_value(path)?;
        Some(RouteMatch {
            handlers: handlers.clone(),
            params: Params::new(),
            full_path: full_path.clone(),
        })
    }
}
