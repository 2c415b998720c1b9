//! Handler units and chains.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use super::{Context, Result};

type HandlerFn = dyn Fn(&mut Context) -> Result<()> + Send + Sync;

/// One unit of a handler chain.
///
/// Cloning is cheap: the function is shared.
#[derive(Clone)]
pub struct Handler {
    name: &'static str,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// Wrap a function, naming it after its type.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: type_name::<F>(),
            func: Arc::new(func),
        }
    }

    /// Wrap a function under an explicit name.
    pub fn named<F>(name: &'static str, func: F) -> Self
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name,
            func: Arc::new(func),
        }
    }

    /// Name used in debug output and [`Context::handler_name`].
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the handler.
    #[inline]
    pub fn call(&self, ctx: &mut Context) -> Result<()> {
        (self.func)(ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.name).finish()
    }
}

/// Shorthand for [`Handler::new`].
pub fn handler<F>(func: F) -> Handler
where
    F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
{
    Handler::new(func)
}

/// Immutable, shared handler sequence for one route.
pub type HandlersChain = Arc<[Handler]>;

/// A chain with no handlers.
pub fn empty_chain() -> HandlersChain {
    Arc::new([])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_fn(_: &mut Context) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_handler_names() {
        let h = Handler::new(named_fn);
        assert!(h.name().ends_with("named_fn"), "got {}", h.name());

        let h = Handler::named("custom", |_| Ok(()));
        assert_eq!(h.name(), "custom");
        assert_eq!(format!("{:?}", h), "Handler(\"custom\")");
    }

    #[test]
    fn test_empty_chain() {
        assert!(empty_chain().is_empty());
    }
}
