//! Route groups.

use super::{RouteTable, Routes};
use crate::core::Handler;

/// Prefix and middleware shared by a set of routes.
///
/// A group borrows the engine's route table for as long as it is used to
/// register routes.
pub struct RouterGroup<'a> {
    table: &'a mut RouteTable,
    handlers: Vec<Handler>,
    base_path: String,
}

impl<'a> RouterGroup<'a> {
    pub(crate) fn new(table: &'a mut RouteTable, handlers: Vec<Handler>, base_path: String) -> Self {
        Self {
            table,
            handlers,
            base_path,
        }
    }
}

impl Routes for RouterGroup<'_> {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn middleware(&self) -> &[Handler] {
        &self.handlers
    }

    fn middleware_mut(&mut self) -> &mut Vec<Handler> {
        &mut self.handlers
    }

    fn table_mut(&mut self) -> &mut RouteTable {
        &mut *self.table
    }
}
