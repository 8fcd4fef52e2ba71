//! Priority queue of admission entries.
//!
//! Entries are keyed by [`ResourceId`]: at most one entry per resource exists
//! at any time. Ordering is priority descending, then enqueue sequence
//! ascending (FIFO among equal priorities).

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::resource::ConnectionResource;
use crate::util::ids::ResourceId;

/// Slot an entry was assigned by the most recent reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Occupying a capacity slot (resource is open).
    Active,
    /// Registered, waiting for a slot.
    Waiting,
}

/// A tracked resource with its scheduling attributes.
pub struct QueueEntry<R: ?Sized> {
    resource: Arc<R>,
    id: ResourceId,
    priority: f64,
    enqueued_at_ms: u128,
    sequence: u64,
    slot: Slot,
}

impl<R: ConnectionResource + ?Sized> QueueEntry<R> {
    /// Create an entry. New entries start in [`Slot::Waiting`] until a
    /// reconcile pass places them.
    pub fn new(resource: Arc<R>, priority: f64, enqueued_at_ms: u128, sequence: u64) -> Self {
        let id = resource.id();
        Self {
            resource,
            id,
            priority,
            enqueued_at_ms,
            sequence,
            slot: Slot::Waiting,
        }
    }
}

impl<R: ?Sized> QueueEntry<R> {
    /// Resource handle.
    #[must_use]
    pub const fn resource(&self) -> &Arc<R> {
        &self.resource
    }

    /// Resource identity.
    #[must_use]
    pub const fn id(&self) -> ResourceId {
        self.id
    }

    /// Current priority.
    #[must_use]
    pub const fn priority(&self) -> f64 {
        self.priority
    }

    /// Wall-clock time of first submission.
    #[must_use]
    pub const fn enqueued_at_ms(&self) -> u128 {
        self.enqueued_at_ms
    }

    /// Monotonic submission sequence used for FIFO tie-breaks.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Slot assigned by the last reconcile.
    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    pub(crate) fn set_slot(&mut self, slot: Slot) {
        self.slot = slot;
    }

    /// Queue order: higher priority first, then earlier submission.
    #[must_use]
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl<R: ?Sized> PartialEq for QueueEntry<R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<R: ?Sized> Eq for QueueEntry<R> {}

impl<R: ?Sized> std::fmt::Debug for QueueEntry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`PriorityQueue::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new entry was created.
    Inserted,
    /// An existing entry's priority was updated in place.
    Updated,
}

/// Ordered collection of [`QueueEntry`] values, unique by resource identity.
///
/// Stored as active entries followed by waiting entries, each group in queue
/// order. Small by construction (bounded by live connections), so a sorted
/// vector with linear lookups is used.
pub struct PriorityQueue<R: ?Sized> {
    entries: Vec<QueueEntry<R>>,
    next_sequence: u64,
}

impl<R: ?Sized> Default for PriorityQueue<R> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_sequence: 0,
        }
    }
}

impl<R: ConnectionResource + ?Sized> PriorityQueue<R> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry for `resource`, or update the priority of the
    /// existing one. An update keeps the original sequence and timestamp.
    pub fn upsert(&mut self, resource: Arc<R>, priority: f64, now_ms: u128) -> Upsert {
        let id = resource.id();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.priority = priority;
            self.sort();
            return Upsert::Updated;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries
            .push(QueueEntry::new(resource, priority, now_ms, sequence));
        self.sort();
        Upsert::Inserted
    }
}

impl<R: ?Sized> PriorityQueue<R> {
    /// Remove the entry for `id`, if present.
    pub fn remove(&mut self, id: ResourceId) -> Option<QueueEntry<R>> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx))
    }

    /// Entry for `id`, if tracked.
    #[must_use]
    pub fn get(&self, id: ResourceId) -> Option<&QueueEntry<R>> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Whether `id` is tracked.
    #[must_use]
    pub fn contains(&self, id: ResourceId) -> bool {
        self.get(id).is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries currently marked [`Slot::Active`].
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.in_slot(Slot::Active).count()
    }

    /// Entries currently marked [`Slot::Waiting`].
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.in_slot(Slot::Waiting).count()
    }

    /// Lowest priority among active entries.
    #[must_use]
    pub fn lowest_active_priority(&self) -> Option<f64> {
        self.in_slot(Slot::Active)
            .map(QueueEntry::priority)
            .min_by(f64::total_cmp)
    }

    /// Highest priority among waiting entries.
    #[must_use]
    pub fn highest_waiting_priority(&self) -> Option<f64> {
        self.in_slot(Slot::Waiting)
            .map(QueueEntry::priority)
            .max_by(f64::total_cmp)
    }

    /// Take every entry out, leaving the queue empty.
    pub(crate) fn drain(&mut self) -> Vec<QueueEntry<R>> {
        std::mem::take(&mut self.entries)
    }

    /// Replace the contents with already-partitioned groups. Each group is put
    /// in queue order and the active group is stored first.
    pub(crate) fn restore(&mut self, active: Vec<QueueEntry<R>>, waiting: Vec<QueueEntry<R>>) {
        let mut entries = Vec::with_capacity(active.len() + waiting.len());
        for mut entry in active {
            entry.set_slot(Slot::Active);
            entries.push(entry);
        }
        for mut entry in waiting {
            entry.set_slot(Slot::Waiting);
            entries.push(entry);
        }
        self.entries = entries;
        self.sort();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &QueueEntry<R>> {
        self.entries.iter()
    }

    fn in_slot(&self, slot: Slot) -> impl Iterator<Item = &QueueEntry<R>> {
        self.entries.iter().filter(move |e| e.slot == slot)
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            let group = |e: &QueueEntry<R>| u8::from(e.slot == Slot::Waiting);
            group(a).cmp(&group(b)).then_with(|| a.rank(b))
        });
    }
}
