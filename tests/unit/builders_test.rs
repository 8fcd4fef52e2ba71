//! Tests for builder modules

use std::collections::HashMap;

use prometheus_admission::builders::build_schedulers;
use prometheus_admission::config::{RegistryConfig, SchedulerConfig};
use prometheus_admission::core::{Credentials, QueuedDefer, SchedulerError, StaticCredentials};

use crate::common::FakeConnection;

fn registry() -> RegistryConfig {
    let mut schedulers = HashMap::new();
    schedulers.insert("api".to_string(), SchedulerConfig::new(2, 0.7));
    schedulers.insert("media".to_string(), SchedulerConfig::new(1, 1.0));
    RegistryConfig { schedulers }
}

#[test]
fn test_build_schedulers_from_registry() {
    let defer = QueuedDefer::new();
    let built = build_schedulers::<FakeConnection, _, _, _>(
        &registry(),
        |name, _cfg| Ok(StaticCredentials::new(Credentials::token(format!("{name}-token")))),
        defer,
    )
    .unwrap();

    assert_eq!(built.len(), 2);
    assert_eq!(built.names(), vec!["api", "media"]);

    let api = built.get("api").unwrap();
    assert_eq!(api.name(), Some("api"));
    assert_eq!(api.stats().capacity, 2);

    let r = FakeConnection::new("r");
    api.schedule(r.clone(), 1.0);
    assert_eq!(r.credentials.lock()[0].as_token(), Some("api-token"));
}

#[test]
fn test_unknown_scheduler_lookup() {
    let built = build_schedulers::<FakeConnection, _, _, _>(
        &registry(),
        |_, _| Ok(StaticCredentials::default()),
        QueuedDefer::new(),
    )
    .unwrap();
    assert!(matches!(built.get("nope"), Err(SchedulerError::UnknownScheduler(_))));
}

#[test]
fn test_factory_error_propagates() {
    let result = build_schedulers::<FakeConnection, StaticCredentials, _, _>(
        &registry(),
        |_, _| Err(SchedulerError::Backend("vault sealed".into())),
        QueuedDefer::new(),
    );
    assert!(matches!(result, Err(SchedulerError::Backend(_))));
}

#[test]
fn test_invalid_registry_rejected() {
    let result = build_schedulers::<FakeConnection, StaticCredentials, _, _>(
        &RegistryConfig::default(),
        |_, _| Ok(StaticCredentials::default()),
        QueuedDefer::new(),
    );
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}
