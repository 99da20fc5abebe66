//! Tests for utility types

use prometheus_work_scheduler::util::{elapsed_ms, init_tracing, now_ms, Priority, TaskId, TaskType};

#[test]
fn test_priority_ordering() {
    assert!(Priority::Urgent > Priority::High);
    assert!(Priority::High > Priority::Medium);
    assert!(Priority::Medium > Priority::Low);
    assert_eq!(Priority::default(), Priority::Medium);
}

#[test]
fn test_priority_serde() {
    assert_eq!(serde_json::to_string(&Priority::Urgent).unwrap(), "\"URGENT\"");
    let parsed: Priority = serde_json::from_str("\"LOW\"").unwrap();
    assert_eq!(parsed, Priority::Low);
}

#[test]
fn test_task_type_serde() {
    assert_eq!(
        serde_json::to_string(&TaskType::SemanticSearch).unwrap(),
        "\"semantic_search\""
    );
    let custom: TaskType = serde_json::from_str(r#"{"custom":"summarise"}"#).unwrap();
    assert_eq!(custom, TaskType::custom("summarise"));
    assert_eq!(custom.to_string(), "custom:summarise");
}

#[test]
fn test_task_id() {
    let a = TaskId::new();
    let b = TaskId::new();
    assert_ne!(a, b);
    let json = serde_json::to_string(&a).unwrap();
    let back: TaskId = serde_json::from_str(&json).unwrap();
    assert_eq!(a, back);
}

#[test]
fn test_clock() {
    let start = now_ms();
    assert!(start > 0);
    assert_eq!(elapsed_ms(start + 5, start), 0);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing("warn");
    init_tracing("debug");
}
