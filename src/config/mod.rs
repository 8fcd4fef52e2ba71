//! Configuration models for schedulers and scheduler registries.

pub mod scheduler;

pub use scheduler::{RegistryConfig, SchedulerConfig};
