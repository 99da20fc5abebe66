//! Task registry: the single source of truth for task status.
//!
//! Every status change goes through [`TaskRegistry::update_status`] (or the
//! helpers built on it), which validates the lifecycle edge and stamps the
//! matching timestamp under one lock, so readers never see a half-applied
//! transition.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::{ExecutionOutput, SchedulerError, Task, TaskConfig, TaskSnapshot, TaskStatus};
use crate::util::clock::now_ms;
use crate::util::serde::{Priority, TaskId, TaskType};

/// Counts over every registered task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    /// Registered tasks.
    pub total: usize,
    /// Count per status name.
    pub by_status: BTreeMap<String, usize>,
    /// Count per task type.
    pub by_type: BTreeMap<String, usize>,
    /// Count per priority name.
    pub by_priority: BTreeMap<String, usize>,
}

/// Everything an attempt needs, copied out of the registry when it starts.
#[derive(Debug, Clone)]
pub struct AttemptTicket<P, R> {
    /// Task being run.
    pub id: TaskId,
    /// Executor selector.
    pub task_type: TaskType,
    /// Dispatch priority.
    pub priority: Priority,
    /// Payload copy for this attempt.
    pub payload: P,
    /// Task policy.
    pub config: TaskConfig<R>,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Retries already scheduled.
    pub retry_count: u32,
}

/// Apply `next` to `task` if it is a legal edge, stamping timestamps.
fn apply_status<P, R>(task: &mut Task<P, R>, next: TaskStatus) -> Result<(), SchedulerError> {
    if !task.status.can_transition_to(next) {
        return Err(SchedulerError::IllegalTransition {
            from: task.status,
            to: next,
        });
    }
    let now = now_ms();
    task.status = next;
    match next {
        TaskStatus::Queued => task.queued_at_ms = Some(now),
        TaskStatus::Running => {
            task.started_at_ms = Some(now);
            task.metrics.attempts += 1;
        }
        TaskStatus::Retrying => task.metrics.retry_count += 1,
        TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
            task.completed_at_ms = Some(now);
            task.calculate_metrics();
        }
        TaskStatus::Paused => {}
    }
    Ok(())
}

/// Map from task id to task, guarded by a single lock.
pub struct TaskRegistry<P, R> {
    tasks: Mutex<HashMap<TaskId, Task<P, R>>>,
}

impl<P, R> TaskRegistry<P, R>
where
    P: Clone,
    R: Clone,
{
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Insert `task`. Returns false if its id is already registered.
    pub fn register(&self, task: Task<P, R>) -> bool {
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(&task.id) {
            tracing::warn!(task_id = %task.id, "task already registered");
            return false;
        }
        tasks.insert(task.id, task);
        true
    }

    /// Snapshot of `id`.
    pub fn get(&self, id: TaskId) -> Option<TaskSnapshot<R>> {
        self.tasks.lock().get(&id).map(Task::snapshot)
    }

    /// Current status of `id`.
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.tasks.lock().get(&id).map(|t| t.status)
    }

    /// Run `f` against the task record under the registry lock.
    pub fn inspect<T>(&self, id: TaskId, f: impl FnOnce(&Task<P, R>) -> T) -> Option<T> {
        self.tasks.lock().get(&id).map(f)
    }

    /// Move `id` to `status`, stamping `started_at` on RUNNING and
    /// `completed_at` plus derived metrics on terminal states.
    ///
    /// # Errors
    ///
    /// `TaskNotFound` for unknown ids, `IllegalTransition` when `status` is not
    /// reachable from the current status.
    pub fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id).ok_or(SchedulerError::TaskNotFound(id))?;
        apply_status(task, status)
    }

    /// Mark `id` RUNNING and copy out what the attempt needs.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::update_status`]; a task cancelled or paused after
    /// being popped yields `IllegalTransition`.
    pub fn begin_attempt(&self, id: TaskId) -> Result<AttemptTicket<P, R>, SchedulerError> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id).ok_or(SchedulerError::TaskNotFound(id))?;
        apply_status(task, TaskStatus::Running)?;
        Ok(AttemptTicket {
            id,
            task_type: task.task_type.clone(),
            priority: task.priority,
            payload: task.payload.clone(),
            config: task.config.clone(),
            attempt: task.metrics.attempts,
            retry_count: task.metrics.retry_count,
        })
    }

    /// Store the executor output and mark `id` COMPLETED.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::update_status`].
    pub fn complete(&self, id: TaskId, output: ExecutionOutput<R>) -> Result<TaskSnapshot<R>, SchedulerError> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id).ok_or(SchedulerError::TaskNotFound(id))?;
        apply_status(task, TaskStatus::Completed)?;
        task.result = Some(output.result);
        task.metrics.actual_cost = output.actual_cost;
        task.metrics.units_used = output.units_used;
        Ok(task.snapshot())
    }

    /// Store the terminal error and mark `id` FAILED.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::update_status`].
    pub fn fail(&self, id: TaskId, error: String) -> Result<TaskSnapshot<R>, SchedulerError> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id).ok_or(SchedulerError::TaskNotFound(id))?;
        apply_status(task, TaskStatus::Failed)?;
        task.error = Some(error);
        Ok(task.snapshot())
    }

    /// Tasks currently in `status`.
    pub fn get_by_status(&self, status: TaskStatus) -> Vec<TaskSnapshot<R>> {
        self.tasks
            .lock()
            .values()
            .filter(|t| t.status == status)
            .map(Task::snapshot)
            .collect()
    }

    /// Tasks of `task_type`.
    pub fn get_by_type(&self, task_type: &TaskType) -> Vec<TaskSnapshot<R>> {
        self.tasks
            .lock()
            .values()
            .filter(|t| &t.task_type == task_type)
            .map(Task::snapshot)
            .collect()
    }

    /// Count of tasks in `status`.
    pub fn count_by_status(&self, status: TaskStatus) -> usize {
        self.tasks.lock().values().filter(|t| t.status == status).count()
    }

    /// Drop `id` regardless of status. Used to roll back a failed submit.
    pub fn remove(&self, id: TaskId) -> bool {
        self.tasks.lock().remove(&id).is_some()
    }

    /// Counts by status, type and priority.
    pub fn stats(&self) -> RegistryStats {
        let tasks = self.tasks.lock();
        let mut stats = RegistryStats {
            total: tasks.len(),
            ..RegistryStats::default()
        };
        for task in tasks.values() {
            *stats.by_status.entry(task.status.to_string()).or_default() += 1;
            *stats.by_type.entry(task.task_type.to_string()).or_default() += 1;
            *stats.by_priority.entry(task.priority.to_string()).or_default() += 1;
        }
        stats
    }

    /// Remove terminal tasks that finished more than `older_than` ago.
    pub fn purge_completed(&self, older_than: Duration) -> usize {
        let cutoff = now_ms().saturating_sub(older_than.as_millis());
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|_, t| {
            !(t.status.is_terminal() && t.completed_at_ms.is_some_and(|done| done <= cutoff))
        });
        before - tasks.len()
    }

    /// Registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl<P: Clone, R: Clone> Default for TaskRegistry<P, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(priority: Priority) -> Task<String, String> {
        Task::new(
            TaskType::TextClassification,
            "payload".to_string(),
            priority,
            TaskConfig::new(),
        )
    }

    #[test]
    fn register_rejects_duplicates() {
        let registry = TaskRegistry::new();
        let t = task(Priority::Medium);
        let dup = t.clone();
        assert!(registry.register(t));
        assert!(!registry.register(dup));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn running_stamps_start_and_counts_attempt() {
        let registry = TaskRegistry::new();
        let t = task(Priority::High);
        let id = t.id;
        registry.register(t);

        let ticket = registry.begin_attempt(id).unwrap();
        assert_eq!(ticket.attempt, 1);
        assert_eq!(ticket.payload, "payload");

        let snap = registry.get(id).unwrap();
        assert_eq!(snap.status, TaskStatus::Running);
        assert!(snap.started_at_ms.is_some());
        assert!(snap.completed_at_ms.is_none());
    }

    #[test]
    fn completion_stores_result_and_metrics() {
        let registry = TaskRegistry::new();
        let t = task(Priority::Low);
        let id = t.id;
        registry.register(t);
        registry.begin_attempt(id).unwrap();

        let snap = registry
            .complete(id, ExecutionOutput::new("done".to_string()).with_cost(0.5).with_units(42))
            .unwrap();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!(snap.result.as_deref(), Some("done"));
        assert!(snap.error.is_none());
        assert_eq!(snap.metrics.units_used, 42);
        assert_eq!(
            snap.metrics.queue_time_ms + snap.metrics.execution_time_ms,
            snap.metrics.total_time_ms
        );
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let registry = TaskRegistry::<String, String>::new();
        let t = task(Priority::Medium);
        let id = t.id;
        registry.register(t);

        let err = registry.update_status(id, TaskStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::IllegalTransition { from: TaskStatus::Queued, to: TaskStatus::Completed }
        ));

        registry.update_status(id, TaskStatus::Cancelled).unwrap();
        assert!(registry.update_status(id, TaskStatus::Cancelled).is_err());
        assert!(registry.begin_attempt(id).is_err());

        let missing = registry.update_status(TaskId::new(), TaskStatus::Running);
        assert!(matches!(missing, Err(SchedulerError::TaskNotFound(_))));
    }

    #[test]
    fn retry_cycle_counts_retries() {
        let registry = TaskRegistry::<String, String>::new();
        let t = task(Priority::Medium);
        let id = t.id;
        registry.register(t);

        registry.begin_attempt(id).unwrap();
        registry.update_status(id, TaskStatus::Retrying).unwrap();
        registry.update_status(id, TaskStatus::Queued).unwrap();
        let ticket = registry.begin_attempt(id).unwrap();
        assert_eq!(ticket.attempt, 2);
        assert_eq!(ticket.retry_count, 1);

        let snap = registry.fail(id, "boom".into()).unwrap();
        assert_eq!(snap.status, TaskStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("boom"));
        assert!(snap.result.is_none());
    }

    #[test]
    fn stats_and_queries() {
        let registry = TaskRegistry::<String, String>::new();
        let a = task(Priority::High);
        let b = task(Priority::Low);
        let b_id = b.id;
        registry.register(a);
        registry.register(b);
        registry.update_status(b_id, TaskStatus::Paused).unwrap();

        let stats = registry.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status["queued"], 1);
        assert_eq!(stats.by_status["paused"], 1);
        assert_eq!(stats.by_type["text_classification"], 2);
        assert_eq!(stats.by_priority["HIGH"], 1);

        assert_eq!(registry.get_by_status(TaskStatus::Paused).len(), 1);
        assert_eq!(registry.get_by_type(&TaskType::TextClassification).len(), 2);
        assert!(registry.get_by_type(&TaskType::SemanticSearch).is_empty());
    }

    #[test]
    fn purge_only_removes_old_terminal_tasks() {
        let registry = TaskRegistry::<String, String>::new();
        let done = task(Priority::Medium);
        let done_id = done.id;
        let live = task(Priority::Medium);
        registry.register(done);
        registry.register(live);
        registry.update_status(done_id, TaskStatus::Cancelled).unwrap();

        // Recently finished: kept with a one-hour retention.
        assert_eq!(registry.purge_completed(Duration::from_secs(3600)), 0);
        // Zero retention: terminal tasks go, live ones stay.
        assert_eq!(registry.purge_completed(Duration::ZERO), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(done_id).is_none());
    }
}
