//! Tests for configuration validation

use std::collections::HashMap;
use std::io::Write;

use prometheus_admission::config::{RegistryConfig, SchedulerConfig};

#[test]
fn test_scheduler_config_validation() {
    assert!(SchedulerConfig::new(1, 0.7).validate().is_ok());
    assert!(SchedulerConfig::new(4, 1.0).validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_capacity() {
    assert!(SchedulerConfig::new(0, 0.7).validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_threshold() {
    assert!(SchedulerConfig::new(1, 0.0).validate().is_err());
    assert!(SchedulerConfig::new(1, -0.5).validate().is_err());
    assert!(SchedulerConfig::new(1, 1.01).validate().is_err());
    assert!(SchedulerConfig::new(1, f64::NAN).validate().is_err());
}

#[test]
fn test_scheduler_config_from_json_fills_defaults() {
    let cfg = SchedulerConfig::from_json_str(r#"{ "capacity": 2 }"#).unwrap();
    assert_eq!(cfg.capacity, 2);
    assert!((cfg.preemption_threshold - 0.7).abs() < f64::EPSILON);
}

#[test]
fn test_scheduler_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{ "capacity": 0 }"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_registry_config_validation() {
    let mut schedulers = HashMap::new();
    schedulers.insert("origin-a".to_string(), SchedulerConfig::new(6, 0.7));
    let config = RegistryConfig { schedulers };
    assert!(config.validate().is_ok());
}

#[test]
fn test_registry_config_empty() {
    let config = RegistryConfig::default();
    assert!(config.validate().is_err());
}

#[test]
fn test_registry_config_names_bad_entry() {
    let mut schedulers = HashMap::new();
    schedulers.insert("broken".to_string(), SchedulerConfig::new(0, 0.7));
    let err = RegistryConfig { schedulers }.validate().unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_registry_config_from_json() {
    let json = r#"{
        "schedulers": {
            "api": { "capacity": 4, "preemption_threshold": 0.5 },
            "media": { "capacity": 2, "preemption_threshold": 1.0 }
        }
    }"#;

    let config = RegistryConfig::from_json_str(json).unwrap();
    assert_eq!(config.schedulers.len(), 2);
    assert_eq!(config.schedulers["media"].capacity, 2);
}

#[test]
fn test_registry_config_from_json_file() {
    let path = std::env::temp_dir().join(format!("admission-registry-{}.json", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, r#"{{ "schedulers": {{ "api": {{ "capacity": 3 }} }} }}"#).unwrap();
    drop(file);

    let config = RegistryConfig::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(config.schedulers["api"].capacity, 3);

    assert!(RegistryConfig::from_json_file("/nonexistent/registry.json").is_err());
}
