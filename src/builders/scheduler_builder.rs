//! Builds named schedulers from a [`RegistryConfig`].

use std::collections::HashMap;

use crate::config::{RegistryConfig, SchedulerConfig};
use crate::core::{ConnectionResource, CredentialProvider, Defer, Scheduler, SchedulerError};

/// Named schedulers built from one registry config.
pub struct SchedulerRegistry<R: ?Sized, C, D> {
    schedulers: HashMap<String, Scheduler<R, C, D>>,
}

impl<R, C, D> SchedulerRegistry<R, C, D>
where
    R: ConnectionResource + ?Sized,
    C: CredentialProvider<R>,
    D: Defer,
{
    /// Scheduler registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownScheduler`] if no such scheduler exists.
    pub fn get(&self, name: &str) -> Result<&Scheduler<R, C, D>, SchedulerError> {
        self.schedulers
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownScheduler(name.to_owned()))
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.schedulers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of schedulers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schedulers.len()
    }

    /// True when no schedulers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schedulers.is_empty()
    }
}

/// Build one named scheduler per registry entry. Each gets its own
/// credential provider from `credentials_factory` and a clone of `defer`.
///
/// # Errors
///
/// Fails if the registry is invalid or a factory call fails.
pub fn build_schedulers<R, C, D, FC>(
    cfg: &RegistryConfig,
    mut credentials_factory: FC,
    defer: D,
) -> Result<SchedulerRegistry<R, C, D>, SchedulerError>
where
    R: ConnectionResource + ?Sized,
    C: CredentialProvider<R>,
    D: Defer + Clone,
    FC: FnMut(&str, &SchedulerConfig) -> Result<C, SchedulerError>,
{
    cfg.validate()?;

    let mut schedulers = HashMap::with_capacity(cfg.schedulers.len());
    for (name, scheduler_cfg) in &cfg.schedulers {
        let credentials = credentials_factory(name, scheduler_cfg)?;
        let scheduler = Scheduler::named(name.clone(), *scheduler_cfg, credentials, defer.clone())?;
        tracing::debug!(
            scheduler = %name,
            capacity = scheduler_cfg.capacity,
            threshold = scheduler_cfg.preemption_threshold,
            "built scheduler"
        );
        schedulers.insert(name.clone(), scheduler);
    }

    Ok(SchedulerRegistry { schedulers })
}
