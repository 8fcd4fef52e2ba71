//! Queue reconciliation: the admission, shrink and preemption algorithm.
//!
//! A pass partitions the queue by live resource state and slot, then:
//!
//! 1. drops entries whose resource already reached `Closed`;
//! 2. shrinks the active set to capacity, evicting lowest priority first;
//! 3. fills free slots from the waiting set, highest priority first;
//! 4. preempts while the best waiter beats the worst occupant by the
//!    configured threshold.
//!
//! A pass never calls into a resource. Every `open`/`close` it decides on is
//! appended to a list of [`ResourceCall`]s that the caller issues once its
//! lock is released. An entry placed in an active slot whose resource is
//! still `Init` counts as opening, so a later pass neither reopens it nor
//! gives its slot away.
//!
//! Evicted entries are removed from the queue, not returned to waiting. The
//! pass is idempotent: running it again on its own output emits no calls and
//! leaves the queue unchanged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::queue::{PriorityQueue, QueueEntry, Slot};
use crate::core::resource::{ConnectionResource, CredentialProvider, ResourceState};
use crate::util::ids::ResourceId;

/// Threshold-gated preemption rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreemptionPolicy {
    threshold: f64,
}

impl PreemptionPolicy {
    /// Policy with the given multiplicative threshold. Values `>= 1.0`
    /// disable preemption.
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// True when only free-capacity admission can happen.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.threshold >= 1.0
    }

    /// Whether a waiter at `waiter` priority may evict an occupant at
    /// `occupant` priority.
    #[must_use]
    pub fn preempts(&self, waiter: f64, occupant: f64) -> bool {
        !self.is_disabled() && waiter * self.threshold > occupant
    }
}

/// A single open or close decision made during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Resource acted on.
    pub resource: ResourceId,
    /// Its priority at the time.
    pub priority: f64,
}

impl Decision {
    fn of<R: ?Sized>(entry: &QueueEntry<R>) -> Self {
        Self {
            resource: entry.id(),
            priority: entry.priority(),
        }
    }
}

/// A call owed to a resource, issued after the scheduler lock is released.
pub enum ResourceCall<R: ?Sized> {
    /// Fetch credentials and open a resource placed in an active slot.
    Open(Arc<R>),
    /// Close an evicted or canceled occupant.
    Close(Arc<R>),
    /// Abort a rejected out-of-band admission.
    Abort(Arc<R>),
}

impl<R: ConnectionResource + ?Sized> ResourceCall<R> {
    /// Resource the call targets.
    #[must_use]
    pub fn resource(&self) -> &Arc<R> {
        match self {
            Self::Open(r) | Self::Close(r) | Self::Abort(r) => r,
        }
    }

    /// Issue the call. Credentials are fetched right before `open()`; an open
    /// for a resource that already left `Init` is skipped.
    pub fn apply<C>(self, credentials: &C)
    where
        C: CredentialProvider<R> + ?Sized,
    {
        match self {
            Self::Open(resource) => {
                if resource.state() == ResourceState::Init {
                    resource.open(credentials.credentials_for(&*resource));
                } else {
                    tracing::debug!(resource = %resource.id(), "skipping open, resource left init");
                }
            }
            Self::Close(resource) => resource.close(),
            Self::Abort(resource) => resource.abort(),
        }
    }
}

impl<R: ConnectionResource + ?Sized> std::fmt::Debug for ResourceCall<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Open(_) => "Open",
            Self::Close(_) => "Close",
            Self::Abort(_) => "Abort",
        };
        f.debug_tuple(kind).field(&self.resource().id()).finish()
    }
}

/// What a reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Entries removed because their resource was already closed.
    pub dropped: Vec<ResourceId>,
    /// Waiters placed into a slot; an `open()` was emitted for each.
    pub opened: Vec<Decision>,
    /// Occupants closed and removed to shrink or preempt.
    pub evicted: Vec<Decision>,
}

impl ReconcileReport {
    /// True when the pass emitted no calls and removed nothing.
    #[must_use]
    pub fn is_fixed_point(&self) -> bool {
        self.dropped.is_empty() && self.opened.is_empty() && self.evicted.is_empty()
    }
}

/// Live occupancy of the queue, read from resource state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occupancy {
    /// Tracked resources currently open or opening.
    pub active: usize,
    /// Lowest priority among them.
    pub lowest_active: Option<f64>,
}

/// Capacity and preemption configuration applied by each pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciler {
    capacity: usize,
    policy: PreemptionPolicy,
}

impl Reconciler {
    /// Create a reconciler. `capacity` must be positive; callers validate
    /// through [`crate::config::SchedulerConfig`].
    #[must_use]
    pub const fn new(capacity: usize, policy: PreemptionPolicy) -> Self {
        Self { capacity, policy }
    }

    /// Maximum concurrently active resources.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Preemption rule in effect.
    #[must_use]
    pub const fn policy(&self) -> PreemptionPolicy {
        self.policy
    }

    /// Count tracked resources that hold a slot: live `Open`, or placed in an
    /// active slot and still opening.
    pub fn occupancy<R>(&self, queue: &PriorityQueue<R>) -> Occupancy
    where
        R: ConnectionResource + ?Sized,
    {
        let occupying = queue.iter().filter(|e| occupies(e));
        let (active, lowest_active) =
            occupying.fold((0, None), |(n, low): (usize, Option<f64>), e| {
                let p = e.priority();
                (n + 1, Some(low.map_or(p, |l| l.min(p))))
            });
        Occupancy {
            active,
            lowest_active,
        }
    }

    /// Whether a candidate at `priority` may take a slot right now, given
    /// live occupancy: either capacity is free or it could preempt the
    /// lowest occupant.
    pub fn admits<R>(&self, queue: &PriorityQueue<R>, priority: f64) -> bool
    where
        R: ConnectionResource + ?Sized,
    {
        let occupancy = self.occupancy(queue);
        if occupancy.active < self.capacity {
            return true;
        }
        occupancy
            .lowest_active
            .is_some_and(|low| self.policy.preempts(priority, low))
    }

    /// Run one pass over `queue`, appending the resource calls it decides
    /// on to `calls`.
    pub fn reconcile<R>(
        &self,
        queue: &mut PriorityQueue<R>,
        calls: &mut Vec<ResourceCall<R>>,
    ) -> ReconcileReport
    where
        R: ConnectionResource + ?Sized,
    {
        let mut report = ReconcileReport::default();
        let mut active = Vec::new();
        let mut waiting = Vec::new();

        for entry in queue.drain() {
            if entry.resource().state() == ResourceState::Closed {
                report.dropped.push(entry.id());
            } else if occupies(&entry) {
                active.push(entry);
            } else {
                waiting.push(entry);
            }
        }
        active.sort_by(QueueEntry::rank);
        waiting.sort_by(QueueEntry::rank);

        // Shrink: out-of-band opens can push the active set past capacity.
        while active.len() > self.capacity {
            if let Some(victim) = active.pop() {
                Self::evict(&victim, calls, &mut report);
            }
        }

        loop {
            // Fill free slots from the front of the waiting set.
            while active.len() < self.capacity && !waiting.is_empty() {
                let candidate = waiting.remove(0);
                Self::admit(&candidate, calls, &mut report);
                active.push(candidate);
                active.sort_by(QueueEntry::rank);
            }

            // Preempt one occupant; the next fill round admits the waiter.
            let beats = match (waiting.first(), active.last()) {
                (Some(w), Some(o)) => self.policy.preempts(w.priority(), o.priority()),
                _ => false,
            };
            if !beats {
                break;
            }
            if let Some(victim) = active.pop() {
                Self::evict(&victim, calls, &mut report);
            }
        }

        queue.restore(active, waiting);

        if !report.is_fixed_point() {
            tracing::debug!(
                dropped = report.dropped.len(),
                opened = report.opened.len(),
                evicted = report.evicted.len(),
                "reconcile pass applied changes"
            );
        }
        report
    }

    fn admit<R>(entry: &QueueEntry<R>, calls: &mut Vec<ResourceCall<R>>, report: &mut ReconcileReport)
    where
        R: ConnectionResource + ?Sized,
    {
        tracing::debug!(resource = %entry.id(), priority = entry.priority(), "opening");
        calls.push(ResourceCall::Open(Arc::clone(entry.resource())));
        report.opened.push(Decision::of(entry));
    }

    fn evict<R>(entry: &QueueEntry<R>, calls: &mut Vec<ResourceCall<R>>, report: &mut ReconcileReport)
    where
        R: ConnectionResource + ?Sized,
    {
        tracing::debug!(resource = %entry.id(), priority = entry.priority(), "evicting");
        calls.push(ResourceCall::Close(Arc::clone(entry.resource())));
        report.evicted.push(Decision::of(entry));
    }
}

/// Whether `entry` holds a capacity slot. Out-of-band opens count even before
/// a pass places them.
fn occupies<R>(entry: &QueueEntry<R>) -> bool
where
    R: ConnectionResource + ?Sized,
{
    match entry.resource().state() {
        ResourceState::Open => true,
        ResourceState::Init => entry.slot() == Slot::Active,
        ResourceState::Closed => false,
    }
}
