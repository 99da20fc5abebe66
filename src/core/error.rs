//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::TaskStatus;
use crate::util::serde::{TaskId, TaskType};

/// Budget window that rejected an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetWindow {
    /// Lifetime spend.
    Total,
    /// Trailing 24 hours.
    Daily,
    /// Trailing hour.
    Hourly,
}

impl std::fmt::Display for BudgetWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Total => f.write_str("total"),
            Self::Daily => f.write_str("daily"),
            Self::Hourly => f.write_str("hourly"),
        }
    }
}

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Estimated cost would push a budget window past its limit.
    #[error("budget exceeded: {window} spend would reach {projected:.4} (limit {limit:.2})")]
    BudgetExceeded {
        /// Window that rejected the estimate.
        window: BudgetWindow,
        /// Spend after adding the estimate.
        projected: f64,
        /// Configured limit of the window.
        limit: f64,
    },
    /// Queue is at capacity.
    #[error("queue full: max size {0} reached")]
    QueueFull(usize),
    /// A task with this id is already registered.
    #[error("duplicate task id {0}")]
    DuplicateTask(TaskId),
    /// No executor is registered for the task type.
    #[error("no executor registered for task type {0}")]
    UnknownTaskType(TaskType),
    /// Task id is not known to the registry.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    /// Requested status change is not an edge of the task state machine.
    #[error("illegal task transition from {from} to {to}")]
    IllegalTransition {
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
    /// Task failed on every allowed attempt.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Executor invocations made.
        attempts: u32,
        /// Error of the final attempt.
        last_error: String,
    },
    /// User callback failed. Logged, never propagated.
    #[error("callback error: {0}")]
    Callback(String),
    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// `start` called on a scheduler whose dispatch loop is already running.
    #[error("scheduler already running")]
    AlreadyRunning,
    /// A synchronisation primitive was closed underneath the caller.
    #[error("scheduler component closed")]
    Closed,
}

impl SchedulerError {
    /// True for rejections raised synchronously by `submit` before a task exists.
    #[must_use]
    pub const fn is_admission(&self) -> bool {
        matches!(
            self,
            Self::BudgetExceeded { .. }
                | Self::QueueFull(_)
                | Self::DuplicateTask(_)
                | Self::UnknownTaskType(_)
        )
    }
}

/// Application-facing result using anyhow for executors and callbacks.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_errors_are_classified() {
        let budget = SchedulerError::BudgetExceeded {
            window: BudgetWindow::Total,
            projected: 1.6,
            limit: 1.0,
        };
        assert!(budget.is_admission());
        assert!(SchedulerError::QueueFull(10).is_admission());
        assert!(!SchedulerError::AlreadyRunning.is_admission());
        assert!(!SchedulerError::Callback("boom".into()).is_admission());
    }

    #[test]
    fn budget_message_names_window() {
        let err = SchedulerError::BudgetExceeded {
            window: BudgetWindow::Hourly,
            projected: 1.25,
            limit: 1.0,
        };
        assert_eq!(
            err.to_string(),
            "budget exceeded: hourly spend would reach 1.2500 (limit 1.00)"
        );
    }
}
