//! Shared test fixtures: an in-process connection resource.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus_admission::core::{
    CompletionHandler, ConnectionResource, Credentials, QueuedDefer, ResourceState, Scheduler,
    StaticCredentials,
};
use prometheus_admission::config::SchedulerConfig;
use prometheus_admission::util::{ResourceId, SubscriptionId};

/// Tracks how many connections are open at once across a test.
#[derive(Default)]
pub struct OpenGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl OpenGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn up(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn down(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Connection that notifies its listeners synchronously from inside
/// `close()`/`abort()`, the way browser-style request objects do.
///
/// Built with [`FakeConnection::deferred_close`], `close()` only records the
/// request and the connection stays open until [`FakeConnection::complete`].
pub struct FakeConnection {
    id: ResourceId,
    pub label: &'static str,
    state: Mutex<ResourceState>,
    listeners: Mutex<Vec<(SubscriptionId, CompletionHandler)>>,
    next_subscription: AtomicU64,
    gauge: Option<Arc<OpenGauge>>,
    deferred_close: bool,
    closing: AtomicBool,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub aborts: AtomicUsize,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub credentials: Mutex<Vec<Credentials>>,
}

impl FakeConnection {
    pub fn new(label: &'static str) -> Arc<Self> {
        Self::build(label, ResourceState::Init, None)
    }

    /// A connection whose `close()` completes later, on `complete()`.
    pub fn deferred_close(label: &'static str) -> Arc<Self> {
        let mut conn = Self::raw(label, ResourceState::Init, None);
        conn.deferred_close = true;
        Arc::new(conn)
    }

    /// A connection the caller already opened before registering it.
    pub fn already_open(label: &'static str) -> Arc<Self> {
        Self::build(label, ResourceState::Open, None)
    }

    pub fn gauged(label: &'static str, gauge: &Arc<OpenGauge>) -> Arc<Self> {
        Self::build(label, ResourceState::Init, Some(Arc::clone(gauge)))
    }

    fn build(label: &'static str, state: ResourceState, gauge: Option<Arc<OpenGauge>>) -> Arc<Self> {
        Arc::new(Self::raw(label, state, gauge))
    }

    fn raw(label: &'static str, state: ResourceState, gauge: Option<Arc<OpenGauge>>) -> Self {
        Self {
            id: ResourceId::new(),
            label,
            state: Mutex::new(state),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            gauge,
            deferred_close: false,
            closing: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
            subscribes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
            credentials: Mutex::new(Vec::new()),
        }
    }

    /// The request finished on its own (response received, error, ...).
    pub fn complete(&self) {
        self.terminate();
    }

    pub fn is_open(&self) -> bool {
        self.state() == ResourceState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ResourceState::Closed
    }

    /// A close was requested but has not completed yet.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst) && !self.is_closed()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Application-level listener, not counted in `subscribes`.
    pub fn on_complete(&self, handler: CompletionHandler) {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id, handler));
    }

    fn terminate(&self) {
        let was = {
            let mut state = self.state.lock();
            let was = *state;
            if was == ResourceState::Closed {
                return;
            }
            *state = ResourceState::Closed;
            was
        };
        if was == ResourceState::Open {
            if let Some(g) = &self.gauge {
                g.down();
            }
        }
        let listeners: Vec<_> = self.listeners.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for listener in listeners {
            listener(self.id);
        }
    }
}

impl ConnectionResource for FakeConnection {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn state(&self) -> ResourceState {
        *self.state.lock()
    }

    fn open(&self, credentials: Credentials) {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().push(credentials);
        let mut state = self.state.lock();
        if *state == ResourceState::Init {
            *state = ResourceState::Open;
            if let Some(g) = &self.gauge {
                g.up();
            }
        }
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.deferred_close {
            self.closing.store(true, Ordering::SeqCst);
        } else {
            self.terminate();
        }
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.terminate();
    }

    fn subscribe(&self, handler: CompletionHandler) -> SubscriptionId {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id, handler));
        id
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().retain(|(id, _)| *id != subscription);
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

pub type TestScheduler = Scheduler<FakeConnection, StaticCredentials, QueuedDefer>;

pub fn scheduler(capacity: usize, threshold: f64) -> (TestScheduler, QueuedDefer) {
    let defer = QueuedDefer::new();
    let scheduler = Scheduler::new(
        SchedulerConfig::new(capacity, threshold),
        StaticCredentials::new(Credentials::token("test-token")),
        defer.clone(),
    )
    .expect("valid config");
    (scheduler, defer)
}
