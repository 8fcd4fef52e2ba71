//! Tokio runtime deferral.

use std::sync::Arc;

use crate::core::defer::{Defer, DeferredTask};

/// Runs deferred scheduler work as tasks on a tokio runtime.
///
/// Deferred work only takes the scheduler's mutex and issues fire-and-forget
/// calls, so it is spawned as an ordinary (non-blocking) task.
#[derive(Clone)]
pub struct TokioDefer {
    handle: Arc<tokio::runtime::Handle>,
}

impl TokioDefer {
    /// Create a deferral bound to an existing runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Bind to the runtime the caller is running in.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl Defer for TokioDefer {
    fn defer(&self, task: DeferredTask) {
        self.handle.spawn(async move { task() });
    }
}
