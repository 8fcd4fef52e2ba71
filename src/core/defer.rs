//! Deferred execution of scheduler follow-up work.
//!
//! Completion notifications may arrive from inside a resource's own
//! `close()`/`abort()` call, while the resource is iterating its listeners and
//! possibly while the scheduler lock is held. The handler therefore never does
//! the work inline: it hands a task to a [`Defer`] implementation, which must
//! run it strictly after the current call stack unwinds.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// A unit of deferred scheduler work.
pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

/// Abstraction for running work on a later tick.
pub trait Defer: Send + Sync + 'static {
    /// Queue `task` to run after the caller returns. Must not run it inline.
    fn defer(&self, task: DeferredTask);
}

/// Channel-backed deferral drained explicitly by the host.
///
/// Suited to single-threaded embeddings (an event loop calls
/// [`QueuedDefer::run_pending`] once per tick) and to deterministic tests.
#[derive(Clone)]
pub struct QueuedDefer {
    tx: Sender<DeferredTask>,
    rx: Receiver<DeferredTask>,
}

impl QueuedDefer {
    /// Create an empty deferral queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Run queued tasks until the queue is empty, including tasks queued by
    /// the tasks themselves. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Run at most one queued task. Returns whether one ran.
    pub fn run_one(&self) -> bool {
        self.rx.try_recv().map(|task| task()).is_ok()
    }
}

impl Default for QueuedDefer {
    fn default() -> Self {
        Self::new()
    }
}

impl Defer for QueuedDefer {
    fn defer(&self, task: DeferredTask) {
        // Both ends live in self, so the channel cannot be disconnected.
        if self.tx.send(task).is_err() {
            tracing::error!("deferral queue disconnected; dropping task");
        }
    }
}
