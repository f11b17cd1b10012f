//! Named in-process handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ResolveError;
use crate::handler::{Handler, SharedHandler};

/// A table of named handlers, the in-process counterpart of an entry
/// module's named exports.
///
/// ```rust,no_run
/// use sls_core::ResponseDescriptor;
/// use sls_runtime::{Exports, handler_fn};
///
/// let exports = Exports::new().export(
///     "http",
///     handler_fn(|_event, _ctx| async {
///         Ok::<_, anyhow::Error>(ResponseDescriptor::new("hi").with_status(200))
///     }),
/// );
/// let handler = exports.resolve("http").unwrap();
/// ```
#[derive(Default, Clone)]
pub struct Exports {
    handlers: BTreeMap<String, SharedHandler>,
}

impl Exports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous export of
    /// the same name.
    pub fn export(mut self, name: impl Into<String>, handler: impl Handler) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn resolve(&self, name: &str) -> Result<SharedHandler, ResolveError> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::ExportNotFound {
                name: name.to_string(),
                available: self.names(),
            })
    }
}
