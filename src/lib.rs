//! # Prometheus Admission
//!
//! A bounded-concurrency, priority-preemptive admission scheduler for
//! network-style connection resources.
//!
//! Callers submit a resource with a priority. Under a fixed capacity the
//! scheduler decides which resources are open, queues the rest, and when a
//! sufficiently higher-priority request arrives with no free capacity, evicts
//! the lowest-priority occupant to make room.
//!
//! ## Key Features
//!
//! - **Capacity Enforcement**: never more than `capacity` resources open,
//!   including resources the caller opened out-of-band before registering
//! - **Threshold-Gated Preemption**: a waiter must beat an occupant by a
//!   multiplicative margin, which damps eviction ping-pong between
//!   near-equal priorities
//! - **Idempotent Reconciliation**: every change runs one deterministic pass
//!   that reaches a fixed point
//! - **Lock-Free Resource Calls**: opens and closes are issued in decision
//!   order after the scheduler lock is released, so listeners may resubmit
//!   work from inside `close()`
//! - **Safe Completion Handling**: resource notifications are deferred off
//!   the notifying call stack, so a resource may notify from inside `close()`
//! - **Paired Listeners**: exactly one subscribe and one unsubscribe per
//!   tracked resource
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_admission::config::SchedulerConfig;
//! use prometheus_admission::core::{Admission, QueuedDefer, Scheduler, StaticCredentials};
//!
//! let defer = QueuedDefer::new();
//! let scheduler = Scheduler::new(
//!     SchedulerConfig::new(1, 0.7),
//!     StaticCredentials::default(),
//!     defer.clone(),
//! )?;
//!
//! assert_eq!(scheduler.schedule(Arc::clone(&r1), 10.0), Admission::Accepted); // opens
//! scheduler.schedule(Arc::clone(&r2), 9.0);  // 9 * 0.7 <= 10: waits
//! scheduler.schedule(Arc::clone(&r3), 20.0); // 20 * 0.7 > 10: r1 evicted, r3 opens
//!
//! // Completion notifications are processed on the host's next tick.
//! defer.run_pending();
//! ```
//!
//! With the `tokio-runtime` feature, [`runtime::TokioDefer`] runs completion
//! handling as tokio tasks instead.
//!
//! For complete scenarios, see `tests/admission_scenarios_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core admission abstractions: resources, queue, reconciler, scheduler.
pub mod core;
/// Configuration models for schedulers and registries.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Runtime adapters for deferred work.
pub mod runtime;
/// Shared utilities.
pub mod util;
