//! Scheduler and registry configuration structures.

use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::error::{AppResult, SchedulerError};
use crate::core::reconciler::{PreemptionPolicy, Reconciler};

/// Environment variable overriding [`SchedulerConfig::capacity`].
pub const ENV_CAPACITY: &str = "ADMISSION_CAPACITY";
/// Environment variable overriding [`SchedulerConfig::preemption_threshold`].
pub const ENV_PREEMPTION_THRESHOLD: &str = "ADMISSION_PREEMPTION_THRESHOLD";

/// Capacity and preemption settings for one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum concurrently active resources.
    pub capacity: usize,
    /// Multiplicative margin in (0, 1]; 1 disables preemption.
    pub preemption_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: 6,
            preemption_threshold: 0.7,
        }
    }
}

impl SchedulerConfig {
    /// Config with explicit values. Call [`Self::validate`] before use.
    #[must_use]
    pub const fn new(capacity: usize, preemption_threshold: f64) -> Self {
        Self {
            capacity,
            preemption_threshold,
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] when capacity is zero or the
    /// threshold lies outside (0, 1].
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.capacity == 0 {
            return Err(SchedulerError::InvalidConfig(
                "capacity must be greater than 0".into(),
            ));
        }
        let t = self.preemption_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "preemption_threshold must be in (0, 1], got {t}"
            )));
        }
        Ok(())
    }

    /// Reconciler applying these settings.
    #[must_use]
    pub const fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.capacity, PreemptionPolicy::new(self.preemption_threshold))
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| SchedulerError::InvalidConfig(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment, loading a `.env`
    /// file first if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails if a variable is set but unparsable, or the result is invalid.
    pub fn from_env() -> AppResult<Self> {
        // A missing .env is normal.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Fails if a value is present but unparsable, or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(ENV_CAPACITY) {
            cfg.capacity = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CAPACITY}={raw:?} is not a positive integer"))?;
        }
        if let Some(raw) = lookup(ENV_PREEMPTION_THRESHOLD) {
            cfg.preemption_threshold = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_PREEMPTION_THRESHOLD}={raw:?} is not a number"))?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Named schedulers, e.g. one per origin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Map of scheduler name to configuration.
    pub schedulers: HashMap<String, SchedulerConfig>,
}

impl RegistryConfig {
    /// Validate all schedulers and ensure at least one exists.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] naming the first bad entry.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.schedulers.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "at least one scheduler must be defined".into(),
            ));
        }
        for (name, cfg) in &self.schedulers {
            cfg.validate().map_err(|e| {
                SchedulerError::InvalidConfig(format!("scheduler `{name}` invalid: {e}"))
            })?;
        }
        Ok(())
    }

    /// Parse registry configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| SchedulerError::InvalidConfig(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a JSON registry file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or its contents are invalid.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Self::from_json_str(&raw)?)
    }
}
