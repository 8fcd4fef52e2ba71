//! Audit trail of admission decisions.
//!
//! Every accept, reject, open, eviction, completion and cancel the scheduler
//! performs can be recorded to an [`AuditSink`].

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;
use crate::util::ids::ResourceId;

/// Decision recorded by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Submission registered (new entry or priority update).
    Accepted,
    /// Submission refused (closed resource or capacity rejection).
    Rejected,
    /// Resource granted a slot and opened by the scheduler.
    Opened,
    /// Active resource closed to shrink or preempt.
    Evicted,
    /// Completion notification processed.
    Completed,
    /// Caller-driven cancel.
    Canceled,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Opened => "opened",
            Self::Evicted => "evicted",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: Uuid,
    /// Resource the decision concerns.
    pub resource: ResourceId,
    /// Scheduler name, if the scheduler was given one.
    pub scheduler: Option<String>,
    /// Decision taken.
    pub action: AuditAction,
    /// Priority of the entry at decision time.
    pub priority: Option<f64>,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink keeping the most recent events.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Bounded sink whose buffer is shared between clones, so callers can keep a
/// handle for inspection after boxing the sink into a scheduler.
#[derive(Clone)]
pub struct SharedAuditSink {
    events: std::sync::Arc<parking_lot::Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl SharedAuditSink {
    /// Create a shared sink keeping at most `max_events` recent events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: std::sync::Arc::new(parking_lot::Mutex::new(VecDeque::with_capacity(
                max_events.min(1024),
            ))),
            max_events,
        }
    }

    /// Snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Recorded actions for `resource`, in order.
    #[must_use]
    pub fn actions_for(&self, resource: ResourceId) -> Vec<AuditAction> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.resource == resource)
            .map(|e| e.action)
            .collect()
    }
}

impl AuditSink for SharedAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    resource: ResourceId,
    scheduler: Option<&str>,
    action: AuditAction,
    priority: Option<f64>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4(),
        resource,
        scheduler: scheduler.map(str::to_owned),
        action,
        priority,
        created_at_ms: now_ms(),
        detail,
    }
}
