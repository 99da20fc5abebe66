//! Tests for builder modules

use std::sync::Arc;

use prometheus_work_scheduler::builders::SchedulerBuilder;
use prometheus_work_scheduler::config::SchedulerConfig;
use prometheus_work_scheduler::core::{executor_fn, ExecutionOutput, SchedulerError, WorkExecutor};
use prometheus_work_scheduler::util::serde::TaskType;

fn echo() -> impl WorkExecutor<String, String> {
    executor_fn(|text: String, _ctx| async move { Ok::<_, anyhow::Error>(ExecutionOutput::new(text)) })
}

#[test]
fn test_builder_requires_executor() {
    let result = SchedulerBuilder::<String, String>::new(SchedulerConfig::default()).build();
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_builder_rejects_invalid_config() {
    let config = SchedulerConfig {
        max_queue_size: 0,
        ..SchedulerConfig::default()
    };
    let result = SchedulerBuilder::new(config)
        .with_executor(TaskType::TextClassification, echo())
        .build();
    match result {
        Err(SchedulerError::InvalidConfig(msg)) => assert!(msg.contains("max_queue_size")),
        _ => panic!("expected invalid config"),
    }
}

#[test]
fn test_builder_rejects_oversized_concurrency() {
    let config = SchedulerConfig {
        max_concurrent: usize::MAX,
        ..SchedulerConfig::default()
    };
    let result = SchedulerBuilder::new(config)
        .with_executor(TaskType::TextClassification, echo())
        .build();
    match result {
        Err(SchedulerError::InvalidConfig(msg)) => assert!(msg.contains("max_concurrent")),
        _ => panic!("expected invalid config"),
    }
}

#[test]
fn test_builder_applies_config() {
    let config = SchedulerConfig {
        max_concurrent: 7,
        max_queue_size: 42,
        ..SchedulerConfig::default()
    };
    let shared: Arc<dyn WorkExecutor<String, String>> = Arc::new(echo());
    let scheduler = SchedulerBuilder::new(config)
        .with_executor(TaskType::TextClassification, echo())
        .with_shared_executor(TaskType::SemanticSearch, shared)
        .build()
        .unwrap();

    let stats = scheduler.statistics();
    assert_eq!(stats.concurrency.max_concurrent, 7);
    assert_eq!(stats.queue.max_size, 42);
    assert_eq!(stats.rate_limit.requests_per_minute.limit, 60);
    assert!((stats.cost.hourly.limit - 1.0).abs() < f64::EPSILON);
    assert!(!stats.status.running);
    assert_eq!(
        scheduler.task_types(),
        vec![TaskType::TextClassification, TaskType::SemanticSearch]
    );
}
