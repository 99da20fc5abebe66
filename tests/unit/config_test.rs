//! Tests for configuration validation

use std::collections::HashMap;

use prometheus_work_scheduler::config::SchedulerConfig;
use prometheus_work_scheduler::core::MAX_CONCURRENT;

#[test]
fn test_defaults_are_valid() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.max_concurrent, 5);
    assert_eq!(config.max_queue_size, 10_000);
    assert_eq!(config.rate_limits.requests_per_minute, 60);
    assert_eq!(config.rate_limits.requests_per_hour, 3600);
    assert_eq!(config.rate_limits.units_per_minute, 90_000);
    assert!((config.budget.total_limit - 100.0).abs() < f64::EPSILON);
    assert!((config.budget.daily_limit - 10.0).abs() < f64::EPSILON);
    assert!((config.budget.hourly_limit - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_invalid_max_concurrent() {
    let config = SchedulerConfig {
        max_concurrent: 0,
        ..SchedulerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_max_concurrent_above_semaphore_capacity() {
    let config = SchedulerConfig {
        max_concurrent: usize::MAX,
        ..SchedulerConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.contains("max_concurrent"));

    let config = SchedulerConfig {
        max_concurrent: MAX_CONCURRENT,
        ..SchedulerConfig::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_event_buffer() {
    let config = SchedulerConfig {
        event_buffer: usize::MAX,
        ..SchedulerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_budget() {
    let mut config = SchedulerConfig::default();
    config.budget.daily_limit = f64::NAN;
    let err = config.validate().unwrap_err();
    assert!(err.contains("daily_limit"));

    config.budget.daily_limit = 10.0;
    config.budget.hourly_limit = 0.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_timing() {
    let mut config = SchedulerConfig::default();
    config.timing.wait_poll_ms = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_from_json_partial() {
    let json = r#"{
        "max_concurrent": 8,
        "rate_limits": { "requests_per_minute": 120 },
        "budget": { "hourly_limit": 2.5 }
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.max_concurrent, 8);
    assert_eq!(config.rate_limits.requests_per_minute, 120);
    assert_eq!(config.rate_limits.requests_per_hour, 3600);
    assert!((config.budget.hourly_limit - 2.5).abs() < f64::EPSILON);
    assert_eq!(config.max_queue_size, 10_000);
}

#[test]
fn test_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{ "max_queue_size": 0 }"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").unwrap_err().starts_with("parse error"));
}

#[test]
fn test_from_lookup_overrides() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("WORK_SCHEDULER_MAX_CONCURRENT", "3"),
        ("WORK_SCHEDULER_REQUESTS_PER_MINUTE", " 30 "),
        ("WORK_SCHEDULER_BUDGET_DAILY", "25.5"),
    ]);
    let config = SchedulerConfig::from_lookup(|name| vars.get(name).map(|v| (*v).to_string())).unwrap();
    assert_eq!(config.max_concurrent, 3);
    assert_eq!(config.rate_limits.requests_per_minute, 30);
    assert!((config.budget.daily_limit - 25.5).abs() < f64::EPSILON);
    assert_eq!(config.max_queue_size, 10_000);
}

#[test]
fn test_from_lookup_rejects_garbage() {
    let err = SchedulerConfig::from_lookup(|name| {
        (name == "WORK_SCHEDULER_MAX_QUEUE_SIZE").then(|| "lots".to_string())
    })
    .unwrap_err();
    assert!(err.contains("WORK_SCHEDULER_MAX_QUEUE_SIZE"));
}

#[test]
fn test_from_lookup_validates() {
    let err = SchedulerConfig::from_lookup(|name| {
        (name == "WORK_SCHEDULER_MAX_CONCURRENT").then(|| "0".to_string())
    })
    .unwrap_err();
    assert!(err.contains("max_concurrent"));
}
