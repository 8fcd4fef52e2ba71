//! Core admission abstractions: resources, queue, reconciler and scheduler.

pub mod audit;
pub mod defer;
pub mod error;
pub mod queue;
pub mod reconciler;
pub mod resource;
pub mod scheduler;

pub use audit::{
    build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, SharedAuditSink,
};
pub use defer::{Defer, DeferredTask, QueuedDefer};
pub use error::{AppResult, SchedulerError};
pub use queue::{PriorityQueue, QueueEntry, Slot, Upsert};
pub use reconciler::{
    Decision, Occupancy, PreemptionPolicy, ReconcileReport, Reconciler, ResourceCall,
};
pub use resource::{
    CompletionHandler, ConnectionResource, CredentialProvider, Credentials, ResourceState,
    StaticCredentials,
};
pub use scheduler::{Admission, Rejection, Scheduler, SchedulerStats};
