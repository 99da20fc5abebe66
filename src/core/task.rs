//! Task records, configuration, metrics and lifecycle status.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::AppResult;
use crate::util::clock::{elapsed_ms, now_ms};
use crate::util::serde::{Priority, TaskId, TaskType};

/// Status of a task in the scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the priority queue.
    Queued,
    /// Holding a concurrency permit, executor invoked.
    Running,
    /// Failed an attempt, waiting out the backoff before re-queueing.
    Retrying,
    /// Finished successfully.
    Completed,
    /// Failed on every allowed attempt.
    Failed,
    /// Cancelled before it ever ran.
    Cancelled,
    /// Taken out of the queue until resumed.
    Paused,
}

impl TaskStatus {
    /// Terminal states are never left.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `next` is an edge of the lifecycle state machine.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running | Self::Cancelled | Self::Paused)
                | (Self::Running, Self::Completed | Self::Retrying | Self::Failed)
                | (Self::Retrying, Self::Queued)
                | (Self::Paused, Self::Queued | Self::Cancelled)
        )
    }

    /// Lower-case name used in statistics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress report handed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    /// Task reporting progress.
    pub task_id: TaskId,
    /// Units of work done so far.
    pub completed: u64,
    /// Total units of work.
    pub total: u64,
    /// `completed / total`, or 0 when `total` is 0.
    pub fraction: f64,
}

/// Completion callback. Runs on the dispatch path and must not block.
pub type TaskCallback<R> = Arc<dyn Fn(&TaskSnapshot<R>) -> AppResult<()> + Send + Sync>;

/// Progress callback. Runs inside the executor and must not block.
pub type ProgressCallback = Arc<dyn Fn(Progress) -> AppResult<()> + Send + Sync>;

/// Per-task execution policy.
pub struct TaskConfig<R> {
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,
    /// Base delay; retry `n` waits `retry_delay * 2^n`.
    pub retry_delay: Duration,
    /// Advisory timeout for executors. The scheduler does not enforce it.
    pub timeout: Option<Duration>,
    /// Resource units reserved against the units/minute rate window.
    pub estimated_units: u64,
    /// Estimated spend used for budget admission.
    pub estimated_cost: f64,
    /// Invoked once after the task completes.
    pub on_success: Option<TaskCallback<R>>,
    /// Invoked once after the task fails for good.
    pub on_error: Option<TaskCallback<R>>,
    /// Invoked by executors reporting progress.
    pub on_progress: Option<ProgressCallback>,
    /// Free-form caller data, reported in snapshots.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl<R> TaskConfig<R> {
    /// Defaults: 3 retries, 1s base delay, no timeout, zero estimates.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            timeout: None,
            estimated_units: 0,
            estimated_cost: 0.0,
            on_success: None,
            on_error: None,
            on_progress: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the retry limit.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff base delay.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the advisory timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the resource units estimate.
    #[must_use]
    pub fn with_estimated_units(mut self, units: u64) -> Self {
        self.estimated_units = units;
        self
    }

    /// Set the cost estimate.
    #[must_use]
    pub fn with_estimated_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = cost;
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Register the success callback.
    #[must_use]
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskSnapshot<R>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Register the error callback.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskSnapshot<R>) -> AppResult<()> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Register the progress callback.
    #[must_use]
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(Progress) -> AppResult<()> + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(f));
        self
    }

    /// Backoff before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.retry_delay.saturating_mul(factor)
    }
}

impl<R> Default for TaskConfig<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for TaskConfig<R> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            timeout: self.timeout,
            estimated_units: self.estimated_units,
            estimated_cost: self.estimated_cost,
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            on_progress: self.on_progress.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl<R> fmt::Debug for TaskConfig<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskConfig")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("timeout", &self.timeout)
            .field("estimated_units", &self.estimated_units)
            .field("estimated_cost", &self.estimated_cost)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Timing and spend figures derived from lifecycle timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetrics {
    /// From submission until the last attempt started (includes backoff).
    pub queue_time_ms: u64,
    /// From the last attempt start until completion.
    pub execution_time_ms: u64,
    /// From submission until completion.
    pub total_time_ms: u64,
    /// Retries scheduled so far.
    pub retry_count: u32,
    /// Executor invocations so far.
    pub attempts: u32,
    /// Resource units reported by the executor.
    pub units_used: u64,
    /// Cost estimated at admission.
    pub estimated_cost: f64,
    /// Cost reported by the executor.
    pub actual_cost: f64,
}

/// A schedulable unit of work.
#[derive(Debug, Clone)]
pub struct Task<P, R> {
    /// Unique identifier.
    pub id: TaskId,
    /// Executor selector.
    pub task_type: TaskType,
    /// Dispatch priority.
    pub priority: Priority,
    /// Opaque data handed to the executor.
    pub payload: P,
    /// Retry, estimate and callback policy.
    pub config: TaskConfig<R>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Executor output, set once on completion.
    pub result: Option<R>,
    /// Terminal error, set once on failure.
    pub error: Option<String>,
    /// Submission time (ms since epoch).
    pub created_at_ms: u128,
    /// Last time the task entered the queue.
    pub queued_at_ms: Option<u128>,
    /// Start of the latest attempt.
    pub started_at_ms: Option<u128>,
    /// Time the task reached a terminal status.
    pub completed_at_ms: Option<u128>,
    /// Derived metrics.
    pub metrics: TaskMetrics,
}

impl<P, R> Task<P, R> {
    /// Create a QUEUED task with a fresh id.
    pub fn new(task_type: TaskType, payload: P, priority: Priority, config: TaskConfig<R>) -> Self {
        let now = now_ms();
        Self {
            id: TaskId::new(),
            task_type,
            priority,
            payload,
            metrics: TaskMetrics {
                estimated_cost: config.estimated_cost,
                ..TaskMetrics::default()
            },
            config,
            status: TaskStatus::Queued,
            result: None,
            error: None,
            created_at_ms: now,
            queued_at_ms: Some(now),
            started_at_ms: None,
            completed_at_ms: None,
        }
    }

    /// Recompute timing metrics from the recorded timestamps.
    pub fn calculate_metrics(&mut self) {
        let Some(completed) = self.completed_at_ms else {
            return;
        };
        let started = self.started_at_ms.unwrap_or(completed);
        self.metrics.queue_time_ms = elapsed_ms(self.created_at_ms, started);
        self.metrics.execution_time_ms = elapsed_ms(started, completed);
        self.metrics.total_time_ms = elapsed_ms(self.created_at_ms, completed);
    }
}

impl<P, R: Clone> Task<P, R> {
    /// Point-in-time view without payload or callbacks.
    #[must_use]
    pub fn snapshot(&self) -> TaskSnapshot<R> {
        TaskSnapshot {
            id: self.id,
            task_type: self.task_type.clone(),
            priority: self.priority,
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            created_at_ms: self.created_at_ms,
            queued_at_ms: self.queued_at_ms,
            started_at_ms: self.started_at_ms,
            completed_at_ms: self.completed_at_ms,
            metrics: self.metrics.clone(),
            metadata: self.config.metadata.clone(),
        }
    }
}

/// Read-only copy of a task's observable state.
#[derive(Debug, Clone, Serialize)]
#[serde(bound(serialize = "R: Serialize"))]
pub struct TaskSnapshot<R> {
    /// Unique identifier.
    pub id: TaskId,
    /// Executor selector.
    pub task_type: TaskType,
    /// Dispatch priority.
    pub priority: Priority,
    /// Status when the snapshot was taken.
    pub status: TaskStatus,
    /// Executor output, if completed.
    pub result: Option<R>,
    /// Terminal error, if failed.
    pub error: Option<String>,
    /// Submission time (ms since epoch).
    pub created_at_ms: u128,
    /// Last time the task entered the queue.
    pub queued_at_ms: Option<u128>,
    /// Start of the latest attempt.
    pub started_at_ms: Option<u128>,
    /// Terminal time.
    pub completed_at_ms: Option<u128>,
    /// Derived metrics.
    pub metrics: TaskMetrics,
    /// Caller metadata.
    pub metadata: HashMap<String, serde_json::Value>,
}
