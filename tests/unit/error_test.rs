//! Tests for error types

use prometheus_work_scheduler::core::{BudgetWindow, SchedulerError, TaskStatus};
use prometheus_work_scheduler::util::serde::{TaskId, TaskType};

#[test]
fn test_queue_full_error() {
    let err = SchedulerError::QueueFull(10_000);
    assert_eq!(format!("{}", err), "queue full: max size 10000 reached");
    assert!(err.is_admission());
}

#[test]
fn test_unknown_task_type_error() {
    let err = SchedulerError::UnknownTaskType(TaskType::EmbeddingGeneration);
    assert_eq!(format!("{}", err), "no executor registered for task type embedding_generation");
    assert!(err.is_admission());
}

#[test]
fn test_illegal_transition_error() {
    let err = SchedulerError::IllegalTransition {
        from: TaskStatus::Completed,
        to: TaskStatus::Cancelled,
    };
    assert_eq!(format!("{}", err), "illegal task transition from completed to cancelled");
    assert!(!err.is_admission());
}

#[test]
fn test_retries_exhausted_error() {
    let err = SchedulerError::RetriesExhausted {
        attempts: 4,
        last_error: "timeout".into(),
    };
    assert_eq!(format!("{}", err), "retries exhausted after 4 attempts: timeout");
}

#[test]
fn test_budget_error_is_admission() {
    let err = SchedulerError::BudgetExceeded {
        window: BudgetWindow::Daily,
        projected: 10.5,
        limit: 10.0,
    };
    assert!(err.is_admission());
    assert!(format!("{}", err).contains("daily"));
}

#[test]
fn test_task_not_found_error() {
    let id = TaskId::new();
    let err = SchedulerError::TaskNotFound(id);
    assert_eq!(format!("{}", err), format!("task {id} not found"));
}
