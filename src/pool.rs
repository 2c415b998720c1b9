//! Recycling of request contexts.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::core::{Context, ContextConfig, Request, Sink};

/// Arena of idle contexts.
///
/// Contexts are reset on [`ContextPool::release`], so an acquired context
/// never carries state from an earlier request.
pub struct ContextPool {
    idle: Mutex<Vec<Context>>,
    capacity: usize,
    config: Arc<ContextConfig>,
}

impl ContextPool {
    /// Create a pool keeping at most `capacity` idle contexts.
    pub fn new(capacity: usize, config: Arc<ContextConfig>) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            capacity,
            config,
        }
    }

    fn idle(&self) -> MutexGuard<'_, Vec<Context>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a context bound to `request` and `sink`.
    pub fn acquire(
        &self,
        request: Request,
        sink: Box<dyn Sink>,
        client_gone: CancellationToken,
    ) -> Context {
        let recycled = self.idle().pop();
        let mut ctx = recycled.unwrap_or_else(|| Context::idle(Arc::clone(&self.config)));
        ctx.prepare(request, sink, client_gone);
        ctx
    }

    /// Reset `ctx` and keep it for reuse if there is room.
    pub fn release(&self, mut ctx: Context) {
        ctx.reset();
        let mut idle = self.idle();
        if idle.len() < self.capacity {
            idle.push(ctx);
        }
    }

    /// Number of contexts ready for reuse.
    pub fn idle_count(&self) -> usize {
        self.idle().len()
    }

    /// Settings handed to every context.
    pub fn config(&self) -> &Arc<ContextConfig> {
        &self.config
    }
}
