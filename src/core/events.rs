//! Lifecycle events broadcast to subscribers.
//!
//! An alternative to per-task callbacks: callers `subscribe()` and await
//! events instead of registering closures that run on the dispatch path.
//! Slow subscribers lag and lose the oldest events; publishing never blocks.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::util::clock::now_ms;
use crate::util::serde::{Priority, TaskId, TaskType};

/// What happened to a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskEventKind {
    /// Accepted by `submit`.
    Submitted,
    /// An attempt started.
    Started {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Finished successfully.
    Completed {
        /// Cost reported by the executor.
        actual_cost: f64,
    },
    /// Attempt failed, retry scheduled after `delay_ms`.
    RetryScheduled {
        /// Retry number, 1-based.
        retry: u32,
        /// Backoff before the task is re-queued.
        delay_ms: u64,
        /// Error of the failed attempt.
        error: String,
    },
    /// Failed for good.
    Failed {
        /// Terminal error.
        error: String,
    },
    /// Cancelled before running.
    Cancelled,
    /// Taken out of the queue.
    Paused,
    /// Put back in the queue.
    Resumed,
}

/// Event record published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskEvent {
    /// Task concerned.
    pub task_id: TaskId,
    /// Executor selector.
    pub task_type: TaskType,
    /// Dispatch priority.
    pub priority: Priority,
    /// Event time (ms since epoch).
    pub at_ms: u128,
    /// Event detail.
    #[serde(flatten)]
    pub kind: TaskEventKind,
}

/// Broadcast channel for [`TaskEvent`]s.
pub(crate) struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, task_id: TaskId, task_type: TaskType, priority: Priority, kind: TaskEventKind) {
        if self.sender.receiver_count() == 0 {
            return;
        }
        // Send only fails when every receiver dropped in between.
        let _ = self.sender.send(TaskEvent {
            task_id,
            task_type,
            priority,
            at_ms: now_ms(),
            kind,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}
