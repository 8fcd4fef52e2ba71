//! Tests for audit sink

use prometheus_admission::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, SharedAuditSink,
};
use prometheus_admission::util::ResourceId;

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let resource = ResourceId::new();

    let event = build_audit_event(
        resource,
        Some("origin-a"),
        AuditAction::Opened,
        Some(4.0),
        Some("inserted".to_string()),
    );

    sink.record(event);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].resource, resource);
    assert_eq!(events[0].scheduler.as_deref(), Some("origin-a"));
    assert_eq!(events[0].action, AuditAction::Opened);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    let ids: Vec<_> = (0..3).map(|_| ResourceId::new()).collect();

    for id in &ids {
        sink.record(build_audit_event(*id, None, AuditAction::Accepted, None, None));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].resource, ids[1]); // First one popped
    assert_eq!(events[1].resource, ids[2]);
}

#[test]
fn test_zero_capacity_sink_keeps_nothing() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event(ResourceId::new(), None, AuditAction::Rejected, None, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_shared_sink_is_bounded_and_visible_through_clones() {
    let handle = SharedAuditSink::new(2);
    let mut boxed: Box<dyn AuditSink> = Box::new(handle.clone());
    let ids: Vec<_> = (0..3).map(|_| ResourceId::new()).collect();

    for id in &ids {
        boxed.record(build_audit_event(*id, None, AuditAction::Accepted, None, None));
    }

    let events = handle.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].resource, ids[1]);
    assert!(handle.actions_for(ids[0]).is_empty());
    assert_eq!(handle.actions_for(ids[2]), vec![AuditAction::Accepted]);
}

#[test]
fn test_build_audit_event() {
    let resource = ResourceId::new();
    let a = build_audit_event(resource, None, AuditAction::Evicted, Some(1.5), None);
    let b = build_audit_event(resource, None, AuditAction::Evicted, Some(1.5), None);

    assert_ne!(a.event_id, b.event_id);
    assert_eq!(a.priority, Some(1.5));
    assert!(a.scheduler.is_none());
    assert!(a.created_at_ms > 0);
    assert_eq!(a.action.to_string(), "evicted");
}

#[test]
fn test_audit_event_serializes_action_in_snake_case() {
    let event = build_audit_event(ResourceId::new(), None, AuditAction::Canceled, None, None);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "canceled");
}
