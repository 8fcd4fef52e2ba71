//! Admission scheduler façade.
//!
//! All queue mutations (submission upserts, reconcile passes, completion
//! handling, cancels) run under one `parking_lot::Mutex` per scheduler.
//! Resources are never opened, closed or aborted under that lock. Decisions
//! append [`ResourceCall`]s to a FIFO in the locked state, and one thread at
//! a time drains it with the lock released, so calls land in decision order.
//! A listener that re-enters the scheduler from inside `close()` finds the
//! lock free; its own calls join the FIFO and the active drainer issues them.
//!
//! Completion notifications are handed to [`Defer`] rather than processed on
//! the notifying stack, so the resource's own listener dispatch is never
//! re-entered.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::defer::Defer;
use crate::core::error::SchedulerError;
use crate::core::queue::{PriorityQueue, Slot, Upsert};
use crate::core::reconciler::{ReconcileReport, Reconciler, ResourceCall};
use crate::core::resource::{CompletionHandler, ConnectionResource, CredentialProvider, ResourceState};
use crate::util::clock::now_ms;
use crate::util::ids::{ResourceId, SubscriptionId};

/// Result of [`Scheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// The resource is tracked (new entry or priority update).
    Accepted,
    /// The resource was not taken on.
    Rejected(Rejection),
}

impl Admission {
    /// True for [`Admission::Accepted`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Why a submission was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// The resource was already closed; nothing to schedule.
    Closed,
    /// The resource arrived already open, capacity was full, and it could not
    /// preempt the lowest occupant. It has been aborted.
    OverCapacity,
}

/// Counters and current occupancy of a scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Configured capacity.
    pub capacity: usize,
    /// Entries in an active slot.
    pub active: usize,
    /// Entries waiting for a slot.
    pub waiting: usize,
    /// Total `schedule` calls.
    pub submitted: u64,
    /// Opens issued by reconcile passes.
    pub admitted: u64,
    /// Occupants closed to shrink or preempt.
    pub evicted: u64,
    /// Submissions rejected (closed or over capacity).
    pub rejected: u64,
    /// Completion notifications processed, including those for entries an
    /// eviction or reconcile pass had already removed.
    pub completed: u64,
    /// Caller cancels that removed or closed an entry.
    pub canceled: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: u64,
    admitted: u64,
    evicted: u64,
    rejected: u64,
    completed: u64,
    canceled: u64,
}

struct SchedulerState<R: ?Sized> {
    queue: PriorityQueue<R>,
    /// Outlives queue entries so an evicted resource's late notification
    /// still finds its token.
    subscriptions: HashMap<ResourceId, (Arc<R>, SubscriptionId)>,
    /// Calls decided but not yet issued, in decision order.
    pending: VecDeque<ResourceCall<R>>,
    /// Set while some thread is draining `pending`.
    dispatching: bool,
    counters: Counters,
}

struct Inner<R: ?Sized, C, D> {
    name: Option<String>,
    reconciler: Reconciler,
    state: Mutex<SchedulerState<R>>,
    credentials: C,
    defer: D,
    audit: Mutex<Option<Box<dyn AuditSink>>>,
}

/// Priority-preemptive admission scheduler for connection resources.
///
/// Cheap to clone; clones share the same queue.
///
/// # Example
///
/// ```rust,ignore
/// use prometheus_admission::config::SchedulerConfig;
/// use prometheus_admission::core::{QueuedDefer, Scheduler, StaticCredentials};
///
/// let defer = QueuedDefer::new();
/// let scheduler = Scheduler::new(
///     SchedulerConfig::new(1, 0.7),
///     StaticCredentials::default(),
///     defer.clone(),
/// )?;
///
/// scheduler.schedule(conn_a, 10.0); // opens
/// scheduler.schedule(conn_b, 20.0); // 20 * 0.7 > 10: evicts conn_a, opens conn_b
///
/// // Once per event-loop tick: process completion notifications.
/// defer.run_pending();
/// ```
pub struct Scheduler<R: ?Sized, C, D> {
    inner: Arc<Inner<R, C, D>>,
}

impl<R: ?Sized, C, D> Clone for Scheduler<R, C, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, C, D> Scheduler<R, C, D>
where
    R: ConnectionResource + ?Sized,
    C: CredentialProvider<R>,
    D: Defer,
{
    /// Create a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: SchedulerConfig, credentials: C, defer: D) -> Result<Self, SchedulerError> {
        Self::build(None, config, credentials, defer)
    }

    /// Create a scheduler whose log lines and audit events carry `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if `config` fails validation.
    pub fn named(
        name: impl Into<String>,
        config: SchedulerConfig,
        credentials: C,
        defer: D,
    ) -> Result<Self, SchedulerError> {
        Self::build(Some(name.into()), config, credentials, defer)
    }

    fn build(
        name: Option<String>,
        config: SchedulerConfig,
        credentials: C,
        defer: D,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                name,
                reconciler: config.reconciler(),
                state: Mutex::new(SchedulerState {
                    queue: PriorityQueue::new(),
                    subscriptions: HashMap::new(),
                    pending: VecDeque::new(),
                    dispatching: false,
                    counters: Counters::default(),
                }),
                credentials,
                defer,
                audit: Mutex::new(None),
            }),
        })
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(self, audit: Box<dyn AuditSink>) -> Self {
        *self.inner.audit.lock() = Some(audit);
        self
    }

    /// Scheduler name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Register `resource` at `priority`, or update the priority of an
    /// already tracked resource, then reconcile.
    ///
    /// A resource that is already open but not yet tracked is admitted only
    /// if capacity is free or it could preempt the lowest occupant; otherwise
    /// it is aborted and [`Rejection::OverCapacity`] is returned.
    ///
    /// The resulting `open`/`close`/`abort` calls are issued after the
    /// scheduler lock is released. When another thread is already issuing
    /// calls, or this is a nested call from a resource listener, that thread
    /// issues them and this call returns first.
    pub fn schedule(&self, resource: Arc<R>, priority: f64) -> Admission {
        self.inner.schedule(resource, priority)
    }

    /// Drop interest in `resource`.
    ///
    /// A waiting resource is removed at once without reconciling and its
    /// completion handler is unsubscribed. An active resource is closed; its
    /// completion notification later removes the entry and admits the next
    /// waiter.
    pub fn cancel(&self, resource: &R) {
        self.inner.cancel(resource);
    }

    /// Force a reconcile pass. At a fixed point this issues no calls.
    pub fn reconcile(&self) -> ReconcileReport {
        let mut state = self.inner.state.lock();
        let report = self.inner.reconcile_locked(&mut state);
        self.inner.dispatch(state);
        report
    }

    /// Entries occupying a slot.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().queue.active_count()
    }

    /// Entries waiting for a slot.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.inner.state.lock().queue.waiting_count()
    }

    /// Lowest priority in the active set.
    #[must_use]
    pub fn lowest_active_priority(&self) -> Option<f64> {
        self.inner.state.lock().queue.lowest_active_priority()
    }

    /// Highest priority in the waiting set.
    #[must_use]
    pub fn highest_waiting_priority(&self) -> Option<f64> {
        self.inner.state.lock().queue.highest_waiting_priority()
    }

    /// Whether `resource` currently has an entry.
    #[must_use]
    pub fn contains(&self, resource: &R) -> bool {
        self.inner.state.lock().queue.contains(resource.id())
    }

    /// Current priority of `resource`, if tracked.
    #[must_use]
    pub fn priority_of(&self, resource: &R) -> Option<f64> {
        self.inner
            .state
            .lock()
            .queue
            .get(resource.id())
            .map(crate::core::queue::QueueEntry::priority)
    }

    /// Counters and occupancy.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let state = self.inner.state.lock();
        let c = &state.counters;
        SchedulerStats {
            capacity: self.inner.reconciler.capacity(),
            active: state.queue.active_count(),
            waiting: state.queue.waiting_count(),
            submitted: c.submitted,
            admitted: c.admitted,
            evicted: c.evicted,
            rejected: c.rejected,
            completed: c.completed,
            canceled: c.canceled,
        }
    }
}

impl<R, C, D> Inner<R, C, D>
where
    R: ConnectionResource + ?Sized,
    C: CredentialProvider<R>,
    D: Defer,
{
    fn schedule(self: &Arc<Self>, resource: Arc<R>, priority: f64) -> Admission {
        let id = resource.id();
        let priority = if priority.is_nan() {
            tracing::warn!(resource = %id, "NaN priority treated as 0");
            0.0
        } else {
            priority
        };

        let mut state = self.state.lock();
        state.counters.submitted += 1;

        match resource.state() {
            ResourceState::Closed => {
                state.counters.rejected += 1;
                tracing::debug!(resource = %id, "ignoring closed resource");
                self.record(id, AuditAction::Rejected, Some(priority), Some("closed"));
                return Admission::Rejected(Rejection::Closed);
            }
            ResourceState::Open
                if !state.queue.contains(id) && !self.reconciler.admits(&state.queue, priority) =>
            {
                state.counters.rejected += 1;
                self.record(id, AuditAction::Rejected, Some(priority), Some("over capacity"));
                tracing::info!(
                    scheduler = self.name.as_deref().unwrap_or("-"),
                    resource = %id,
                    priority,
                    "rejecting out-of-band open resource over capacity"
                );
                state.pending.push_back(ResourceCall::Abort(resource));
                self.dispatch(state);
                return Admission::Rejected(Rejection::OverCapacity);
            }
            _ => {}
        }

        let upsert = state.queue.upsert(Arc::clone(&resource), priority, now_ms());
        if !state.subscriptions.contains_key(&id) {
            let subscription = resource.subscribe(self.completion_handler());
            state.subscriptions.insert(id, (resource, subscription));
        }
        let detail = match upsert {
            Upsert::Inserted => "inserted",
            Upsert::Updated => "priority updated",
        };
        tracing::debug!(resource = %id, priority, detail, "accepted");
        self.record(id, AuditAction::Accepted, Some(priority), Some(detail));

        self.reconcile_locked(&mut state);
        self.dispatch(state);
        Admission::Accepted
    }

    fn cancel(&self, resource: &R) {
        let id = resource.id();
        let live = resource.state();
        if live == ResourceState::Closed {
            return;
        }
        let mut state = self.state.lock();
        let Some((priority, slot, handle)) = state
            .queue
            .get(id)
            .map(|e| (e.priority(), e.slot(), Arc::clone(e.resource())))
        else {
            return;
        };
        state.counters.canceled += 1;

        if live == ResourceState::Init && slot == Slot::Waiting {
            state.queue.remove(id);
            Self::release_subscription(&mut state, id);
            self.record(id, AuditAction::Canceled, Some(priority), Some("waiting"));
            tracing::debug!(resource = %id, "canceled waiting resource");
            return;
        }

        // Open or opening. Entry removal and refill happen when the
        // notification lands.
        self.record(id, AuditAction::Canceled, Some(priority), Some("active"));
        tracing::debug!(resource = %id, "closing canceled active resource");
        state.pending.push_back(ResourceCall::Close(handle));
        self.dispatch(state);
    }

    /// Issue queued resource calls with the lock released. Only one thread
    /// drains at a time; a nested or concurrent caller leaves its calls to
    /// the active drainer.
    fn dispatch<'a>(&'a self, mut state: MutexGuard<'a, SchedulerState<R>>) {
        if state.dispatching {
            return;
        }
        state.dispatching = true;
        let _reset = DispatchReset { state: &self.state };
        loop {
            let Some(call) = state.pending.pop_front() else {
                state.dispatching = false;
                return;
            };
            drop(state);
            call.apply(&self.credentials);
            state = self.state.lock();
        }
    }

    /// Handler installed on every tracked resource. Holds only a weak
    /// reference and receives the resource identity explicitly.
    fn completion_handler(self: &Arc<Self>) -> CompletionHandler {
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |id: ResourceId| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let target = Arc::clone(&inner);
            inner
                .defer
                .defer(Box::new(move || target.handle_completion(id)));
        })
    }

    fn handle_completion(&self, id: ResourceId) {
        let mut state = self.state.lock();
        Self::release_subscription(&mut state, id);
        let priority = state.queue.remove(id).map(|e| e.priority());
        state.counters.completed += 1;
        self.record(id, AuditAction::Completed, priority, None);
        tracing::debug!(resource = %id, tracked = priority.is_some(), "completion processed");
        self.reconcile_locked(&mut state);
        self.dispatch(state);
    }

    /// The only place a completion handler is unsubscribed. Removal from the
    /// table makes a second call a no-op.
    fn release_subscription(state: &mut SchedulerState<R>, id: ResourceId) {
        if let Some((resource, subscription)) = state.subscriptions.remove(&id) {
            resource.unsubscribe(subscription);
        }
    }

    fn reconcile_locked(&self, state: &mut SchedulerState<R>) -> ReconcileReport {
        let mut calls = Vec::new();
        let report = self.reconciler.reconcile(&mut state.queue, &mut calls);
        state.pending.extend(calls);
        for id in &report.dropped {
            Self::release_subscription(state, *id);
        }
        state.counters.admitted += report.opened.len() as u64;
        state.counters.evicted += report.evicted.len() as u64;

        for d in &report.opened {
            self.record(d.resource, AuditAction::Opened, Some(d.priority), None);
        }
        for d in &report.evicted {
            tracing::info!(
                scheduler = self.name.as_deref().unwrap_or("-"),
                resource = %d.resource,
                priority = d.priority,
                "evicted"
            );
            self.record(d.resource, AuditAction::Evicted, Some(d.priority), None);
        }
        report
    }

    fn record(&self, id: ResourceId, action: AuditAction, priority: Option<f64>, detail: Option<&str>) {
        if let Some(sink) = self.audit.lock().as_mut() {
            sink.record(build_audit_event(
                id,
                self.name.as_deref(),
                action,
                priority,
                detail.map(str::to_owned),
            ));
        }
    }
}

/// Clears the dispatching flag if a resource call panics mid-drain, so the
/// scheduler keeps issuing calls afterwards.
struct DispatchReset<'a, R: ?Sized> {
    state: &'a Mutex<SchedulerState<R>>,
}

impl<R: ?Sized> Drop for DispatchReset<'_, R> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.state.lock().dispatching = false;
        }
    }
}
