//! The scheduler: admission, dispatch, retries and reporting.
//!
//! One dispatch loop per scheduler pops work from the [`PriorityQueue`],
//! gates it on the [`ConcurrencyController`] and [`RateLimiter`], then runs
//! each attempt on its own tokio task. The loop is owned by the scheduler:
//! [`Scheduler::start`] spawns it and [`Scheduler::stop`] cancels and joins it.
//!
//! Locks are only ever held inside component calls, never across an `.await`.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::events::EventBus;
use crate::core::stats::SchedulerCounters;
use crate::core::{
    AttemptTicket, BudgetLimits, ConcurrencyController, CostController, CostUsage, ExecutionContext,
    ExecutorRegistry, PerformanceStats, PriorityQueue, ProgressReporter, QueueStatus, RateLimitUsage,
    RateLimiter, RegistryStats, RunningSlot, SchedulerError, Task, TaskCallback, TaskConfig, TaskEvent,
    TaskEventKind, TaskOutput, TaskPayload, TaskRegistry, TaskSnapshot, TaskStatus, MAX_CONCURRENT,
};
use crate::util::serde::{Priority, TaskId, TaskType};

/// Poll intervals of the dispatch loop and `wait_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTiming {
    /// Sleep when the queue is empty.
    pub idle_poll: Duration,
    /// Sleep while globally paused.
    pub pause_poll: Duration,
    /// Status poll interval of `wait_for`.
    pub wait_poll: Duration,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_millis(500),
            pause_poll: Duration::from_secs(1),
            wait_poll: Duration::from_millis(500),
        }
    }
}

/// Everything a scheduler is built from. Each component is owned by the
/// scheduler; nothing is global.
pub struct SchedulerParts<P, R>
where
    P: TaskPayload,
    R: TaskOutput,
{
    /// Queue of admitted tasks.
    pub queue: PriorityQueue,
    /// Task records.
    pub registry: TaskRegistry<P, R>,
    /// Running-task cap.
    pub concurrency: ConcurrencyController,
    /// Request and unit windows.
    pub rate_limiter: RateLimiter,
    /// Spend tracking and admission.
    pub cost: CostController,
    /// Executor per task type.
    pub executors: ExecutorRegistry<P, R>,
    /// Poll intervals.
    pub timing: SchedulerTiming,
    /// Lifecycle event channel capacity.
    pub event_buffer: usize,
}

/// One submission for [`Scheduler::submit_batch`].
pub struct TaskRequest<P, R> {
    /// Executor selector.
    pub task_type: TaskType,
    /// Executor input.
    pub payload: P,
    /// Dispatch priority.
    pub priority: Priority,
    /// Task policy.
    pub config: TaskConfig<R>,
}

impl<P, R> TaskRequest<P, R> {
    /// Request at MEDIUM priority with the default config.
    pub fn new(task_type: TaskType, payload: P) -> Self {
        Self {
            task_type,
            payload,
            priority: Priority::default(),
            config: TaskConfig::default(),
        }
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the config.
    #[must_use]
    pub fn with_config(mut self, config: TaskConfig<R>) -> Self {
        self.config = config;
        self
    }
}

/// Runtime adjustments. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    /// New running-task cap.
    pub max_concurrent: Option<usize>,
    /// New requests-per-minute cap.
    pub requests_per_minute: Option<u32>,
    /// New requests-per-hour cap.
    pub requests_per_hour: Option<u32>,
    /// New units-per-minute cap.
    pub units_per_minute: Option<u64>,
    /// New lifetime budget.
    pub budget_limit: Option<f64>,
    /// New daily budget.
    pub daily_limit: Option<f64>,
    /// New hourly budget.
    pub hourly_limit: Option<f64>,
}

impl SettingsUpdate {
    fn validate(&self) -> Result<(), SchedulerError> {
        let invalid = |msg: &str| Err(SchedulerError::InvalidConfig(msg.into()));
        if self.max_concurrent.is_some_and(|n| n == 0 || n > MAX_CONCURRENT) {
            return invalid("max_concurrent must be between 1 and the semaphore permit limit");
        }
        if self.requests_per_minute == Some(0)
            || self.requests_per_hour == Some(0)
            || self.units_per_minute == Some(0)
        {
            return invalid("rate limits must be greater than 0");
        }
        let bad_budget = [self.budget_limit, self.daily_limit, self.hourly_limit]
            .into_iter()
            .flatten()
            .any(|v| !v.is_finite() || v <= 0.0);
        if bad_budget {
            return invalid("budget limits must be finite and greater than 0");
        }
        Ok(())
    }
}

/// Lifecycle part of [`SchedulerStatistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerState {
    /// Dispatch loop running.
    pub running: bool,
    /// Globally paused.
    pub paused: bool,
    /// Time since `start`, 0 when stopped.
    pub uptime_ms: u64,
}

/// Concurrency part of [`SchedulerStatistics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConcurrencyStats {
    /// Tasks holding a slot.
    pub running_tasks: usize,
    /// Configured cap.
    pub max_concurrent: usize,
    /// Ids of tasks holding a slot.
    pub running_task_ids: Vec<TaskId>,
}

/// Point-in-time view of every component.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatistics {
    /// Lifecycle flags.
    pub status: SchedulerState,
    /// Queue sizes.
    pub queue: QueueStatus,
    /// Running tasks.
    pub concurrency: ConcurrencyStats,
    /// Rate window usage.
    pub rate_limit: RateLimitUsage,
    /// Spend per budget window.
    pub cost: CostUsage,
    /// Task counts.
    pub tasks: RegistryStats,
    /// Lifetime outcome counters.
    pub performance: PerformanceStats,
}

struct WorkerHandle {
    shutdown: CancellationToken,
    join: JoinHandle<()>,
    started_at: Instant,
}

struct SchedulerInner<P, R>
where
    P: TaskPayload,
    R: TaskOutput,
{
    queue: PriorityQueue,
    registry: TaskRegistry<P, R>,
    concurrency: ConcurrencyController,
    rate_limiter: RateLimiter,
    cost: CostController,
    executors: ExecutorRegistry<P, R>,
    events: EventBus,
    counters: SchedulerCounters,
    paused: AtomicBool,
    timing: SchedulerTiming,
}

/// Async work scheduler over payloads `P` producing results `R`.
pub struct Scheduler<P, R>
where
    P: TaskPayload,
    R: TaskOutput,
{
    inner: Arc<SchedulerInner<P, R>>,
    worker: Mutex<Option<WorkerHandle>>,
}

fn run_callback<R>(kind: &'static str, callback: Option<&TaskCallback<R>>, snapshot: &TaskSnapshot<R>) {
    let Some(callback) = callback else {
        return;
    };
    match std::panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let err = SchedulerError::Callback(format!("{e:#}"));
            tracing::error!(task_id = %snapshot.id, callback = kind, error = %err, "callback failed");
        }
        Err(_) => {
            tracing::error!(task_id = %snapshot.id, callback = kind, "callback panicked");
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl<P, R> SchedulerInner<P, R>
where
    P: TaskPayload,
    R: TaskOutput,
{
    fn admit(
        &self,
        task_type: TaskType,
        payload: P,
        priority: Priority,
        config: TaskConfig<R>,
    ) -> Result<TaskId, SchedulerError> {
        let Some(executor) = self.executors.get(&task_type) else {
            tracing::warn!(task_type = %task_type, "no executor registered, submission rejected");
            return Err(SchedulerError::UnknownTaskType(task_type));
        };
        let estimated_cost = executor.estimate_cost(&payload, &config);
        self.cost.admit(estimated_cost)?;

        let mut task = Task::new(task_type, payload, priority, config);
        task.metrics.estimated_cost = estimated_cost;
        let id = task.id;
        let task_type = task.task_type.clone();
        if !self.registry.register(task) {
            return Err(SchedulerError::DuplicateTask(id));
        }
        if !self.queue.push(id, priority) {
            // No task may stay registered without being queued.
            self.registry.remove(id);
            tracing::warn!(task_id = %id, max_size = self.queue.max_size(), "queue full, submission rejected");
            return Err(SchedulerError::QueueFull(self.queue.max_size()));
        }

        SchedulerCounters::incr(&self.counters.submitted);
        tracing::info!(task_id = %id, task_type = %task_type, priority = %priority, estimated_cost, "task submitted");
        self.events.publish(id, task_type, priority, TaskEventKind::Submitted);
        Ok(id)
    }

    /// Queue a task already marked QUEUED. If it was cancelled before the
    /// entry landed, the entry is taken back out so the queue holds no
    /// stale ids.
    fn requeue(&self, id: TaskId, priority: Priority) {
        self.queue.requeue(id, priority);
        if self.registry.status(id) != Some(TaskStatus::Queued) {
            self.queue.remove(id);
        }
    }

    /// Publish an event for `id`, reading type and priority from the registry.
    fn publish(&self, id: TaskId, kind: TaskEventKind) {
        if let Some((task_type, priority)) = self.registry.inspect(id, |t| (t.task_type.clone(), t.priority)) {
            self.events.publish(id, task_type, priority, kind);
        }
    }

    async fn dispatch_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut in_flight = JoinSet::new();
        tracing::info!(max_concurrent = self.concurrency.limit(), "dispatch loop started");

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "attempt task aborted");
                }
            }
            if shutdown.is_cancelled() {
                break;
            }
            if self.paused.load(Ordering::Acquire) {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(self.timing.pause_poll) => continue,
                }
            }

            // Reserve before popping so the task taken is the most urgent one
            // present when the slot frees up.
            let permit = tokio::select! {
                () = shutdown.cancelled() => break,
                reserved = self.concurrency.reserve() => match reserved {
                    Ok(permit) => permit,
                    Err(e) => {
                        tracing::error!(error = %e, "concurrency controller closed");
                        break;
                    }
                },
            };
            if self.paused.load(Ordering::Acquire) {
                continue;
            }
            let Some(entry) = self.queue.pop() else {
                drop(permit);
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(self.timing.idle_poll) => continue,
                }
            };

            let id = entry.id;
            let Some(units) = self.registry.inspect(id, |t| {
                (t.status == TaskStatus::Queued).then_some(t.config.estimated_units)
            }).flatten() else {
                tracing::debug!(task_id = %id, "stale queue entry dropped");
                continue;
            };

            let admitted = tokio::select! {
                () = shutdown.cancelled() => false,
                () = self.rate_limiter.acquire(units) => true,
            };
            if !admitted {
                if self.registry.status(id) == Some(TaskStatus::Queued) {
                    self.queue.restore(entry);
                }
                break;
            }

            // Cancelled or paused while waiting on the rate limiter.
            let ticket = match self.registry.begin_attempt(id) {
                Ok(ticket) => ticket,
                Err(e) => {
                    tracing::debug!(task_id = %id, error = %e, "dispatch skipped");
                    continue;
                }
            };
            let slot = permit.assign(id);
            tracing::debug!(
                task_id = %id,
                task_type = %ticket.task_type,
                priority = %ticket.priority,
                attempt = ticket.attempt,
                "attempt started"
            );
            self.events.publish(
                id,
                ticket.task_type.clone(),
                ticket.priority,
                TaskEventKind::Started { attempt: ticket.attempt },
            );
            in_flight.spawn(Arc::clone(&self).execute_attempt(ticket, slot, shutdown.clone()));
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "attempt task aborted");
            }
        }
        tracing::info!("dispatch loop stopped");
    }

    async fn execute_attempt(self: Arc<Self>, ticket: AttemptTicket<P, R>, slot: RunningSlot, shutdown: CancellationToken) {
        let AttemptTicket {
            id,
            task_type,
            priority,
            payload,
            config,
            attempt,
            retry_count,
        } = ticket;
        let ctx = ExecutionContext {
            task_id: id,
            task_type: task_type.clone(),
            priority,
            attempt,
            timeout: config.timeout,
            estimated_units: config.estimated_units,
            progress: ProgressReporter::new(id, config.on_progress.clone()),
        };

        let outcome = match self.executors.get(&task_type) {
            // Own task so a panicking executor fails the attempt instead of
            // leaving the task RUNNING.
            Some(executor) => match tokio::spawn(async move { executor.execute(payload, ctx).await }).await {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("executor panicked: {e}")),
            },
            None => Err(SchedulerError::UnknownTaskType(task_type.clone()).into()),
        };

        match outcome {
            Ok(output) => {
                let actual_cost = output.actual_cost;
                self.cost.record_cost(actual_cost);
                let completed = self.registry.complete(id, output);
                slot.release();
                match completed {
                    Ok(snapshot) => {
                        SchedulerCounters::incr(&self.counters.succeeded);
                        tracing::info!(
                            task_id = %id,
                            task_type = %task_type,
                            attempt,
                            actual_cost,
                            execution_time_ms = snapshot.metrics.execution_time_ms,
                            "task completed"
                        );
                        self.events.publish(id, task_type, priority, TaskEventKind::Completed { actual_cost });
                        run_callback("success", config.on_success.as_ref(), &snapshot);
                    }
                    Err(e) => tracing::error!(task_id = %id, error = %e, "failed to record completion"),
                }
            }
            Err(error) => {
                let message = format!("{error:#}");
                if retry_count < config.max_retries {
                    let retry = retry_count + 1;
                    let delay = config.backoff_for(retry);
                    let marked = self.registry.update_status(id, TaskStatus::Retrying);
                    slot.release();
                    if let Err(e) = marked {
                        tracing::error!(task_id = %id, error = %e, "failed to schedule retry");
                        return;
                    }
                    SchedulerCounters::incr(&self.counters.retried);
                    tracing::warn!(
                        task_id = %id,
                        attempt,
                        retry,
                        max_retries = config.max_retries,
                        delay_ms = millis(delay),
                        error = %message,
                        "attempt failed, retry scheduled"
                    );
                    self.events.publish(
                        id,
                        task_type,
                        priority,
                        TaskEventKind::RetryScheduled {
                            retry,
                            delay_ms: millis(delay),
                            error: message,
                        },
                    );

                    // Shutdown cuts the backoff short so the task is queued, not lost.
                    tokio::select! {
                        () = shutdown.cancelled() => {}
                        () = tokio::time::sleep(delay) => {}
                    }
                    match self.registry.update_status(id, TaskStatus::Queued) {
                        Ok(()) => self.requeue(id, priority),
                        Err(e) => tracing::error!(task_id = %id, error = %e, "failed to re-queue task"),
                    }
                } else {
                    let failed = self.registry.fail(id, message.clone());
                    slot.release();
                    match failed {
                        Ok(snapshot) => {
                            SchedulerCounters::incr(&self.counters.failed);
                            let err = SchedulerError::RetriesExhausted {
                                attempts: snapshot.metrics.attempts,
                                last_error: message.clone(),
                            };
                            tracing::error!(task_id = %id, task_type = %task_type, error = %err, "task failed");
                            self.events.publish(id, task_type, priority, TaskEventKind::Failed { error: message });
                            run_callback("error", config.on_error.as_ref(), &snapshot);
                        }
                        Err(e) => tracing::error!(task_id = %id, error = %e, "failed to record failure"),
                    }
                }
            }
        }
    }
}

impl<P, R> Scheduler<P, R>
where
    P: TaskPayload,
    R: TaskOutput,
{
    /// Assemble a scheduler from its components. The dispatch loop is not
    /// started.
    #[must_use]
    pub fn new(parts: SchedulerParts<P, R>) -> Self {
        let SchedulerParts {
            queue,
            registry,
            concurrency,
            rate_limiter,
            cost,
            executors,
            timing,
            event_buffer,
        } = parts;
        Self {
            inner: Arc::new(SchedulerInner {
                queue,
                registry,
                concurrency,
                rate_limiter,
                cost,
                executors,
                events: EventBus::new(event_buffer),
                counters: SchedulerCounters::default(),
                paused: AtomicBool::new(false),
                timing,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the dispatch loop on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if the loop is already running.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.join.is_finished()) {
            return Err(SchedulerError::AlreadyRunning);
        }
        let shutdown = CancellationToken::new();
        let join = tokio::spawn(Arc::clone(&self.inner).dispatch_loop(shutdown.clone()));
        *worker = Some(WorkerHandle {
            shutdown,
            join,
            started_at: Instant::now(),
        });
        Ok(())
    }

    /// Signal the dispatch loop to stop and wait for it and every in-flight
    /// attempt to finish. Tasks in backoff are re-queued immediately.
    pub async fn stop(&self) {
        let handle = self.worker.lock().take();
        let Some(handle) = handle else {
            return;
        };
        handle.shutdown.cancel();
        if let Err(e) = handle.join.await {
            tracing::error!(error = %e, "dispatch loop panicked");
        }
    }

    /// Whether the dispatch loop is running.
    pub fn is_running(&self) -> bool {
        self.worker.lock().as_ref().is_some_and(|w| !w.join.is_finished())
    }

    /// Stop dispatching new work. Running attempts are unaffected.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::Release);
        tracing::info!("scheduler paused");
    }

    /// Resume dispatching.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::Release);
        tracing::info!("scheduler resumed");
    }

    /// Whether dispatching is paused.
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    /// Admit a task: check the estimated cost against the budget, register it
    /// and queue it.
    ///
    /// # Errors
    ///
    /// Admission errors: `UnknownTaskType`, `BudgetExceeded`, `DuplicateTask`,
    /// `QueueFull`. A rejected task is never registered.
    pub fn submit(
        &self,
        task_type: TaskType,
        payload: P,
        priority: Priority,
        config: TaskConfig<R>,
    ) -> Result<TaskId, SchedulerError> {
        let admitted = self.inner.admit(task_type, payload, priority, config);
        if admitted.is_err() {
            SchedulerCounters::incr(&self.inner.counters.rejected);
        }
        admitted
    }

    /// Submit each request in order; one result per request.
    pub fn submit_batch(&self, requests: Vec<TaskRequest<P, R>>) -> Vec<Result<TaskId, SchedulerError>> {
        requests
            .into_iter()
            .map(|req| self.submit(req.task_type, req.payload, req.priority, req.config))
            .collect()
    }

    /// Cancel a QUEUED or PAUSED task. Returns false for unknown ids and for
    /// tasks in any other status.
    pub fn cancel(&self, id: TaskId) -> bool {
        let inner = &self.inner;
        match inner.registry.status(id) {
            Some(TaskStatus::Queued) => {
                inner.queue.remove(id);
            }
            Some(TaskStatus::Paused) => {}
            Some(status) => {
                tracing::debug!(task_id = %id, status = %status, "cancel refused");
                return false;
            }
            None => return false,
        }
        // Fails if dispatch moved the task to RUNNING in the meantime.
        match inner.registry.update_status(id, TaskStatus::Cancelled) {
            Ok(()) => {
                SchedulerCounters::incr(&inner.counters.cancelled);
                tracing::info!(task_id = %id, "task cancelled");
                inner.publish(id, TaskEventKind::Cancelled);
                true
            }
            Err(e) => {
                tracing::debug!(task_id = %id, error = %e, "cancel lost race with dispatch");
                false
            }
        }
    }

    /// Cancel each id; the map holds the outcome per id.
    pub fn cancel_batch(&self, ids: &[TaskId]) -> HashMap<TaskId, bool> {
        ids.iter().map(|id| (*id, self.cancel(*id))).collect()
    }

    /// Take a QUEUED task out of the queue until [`Self::resume_task`].
    ///
    /// Refused once the dispatcher has popped the task, even if it is still
    /// QUEUED while waiting on the rate limiter.
    pub fn pause_task(&self, id: TaskId) -> bool {
        let inner = &self.inner;
        if inner.registry.status(id) != Some(TaskStatus::Queued) || !inner.queue.remove(id) {
            tracing::debug!(task_id = %id, "pause refused, task not waiting in the queue");
            return false;
        }
        if let Err(e) = inner.registry.update_status(id, TaskStatus::Paused) {
            // Cancelled between the removal and the transition.
            tracing::debug!(task_id = %id, error = %e, "pause refused");
            return false;
        }
        tracing::info!(task_id = %id, "task paused");
        inner.publish(id, TaskEventKind::Paused);
        true
    }

    /// Put a PAUSED task back at the end of its priority level.
    pub fn resume_task(&self, id: TaskId) -> bool {
        let inner = &self.inner;
        if let Err(e) = inner.registry.update_status(id, TaskStatus::Queued) {
            tracing::debug!(task_id = %id, error = %e, "resume refused");
            return false;
        }
        if let Some(priority) = inner.registry.inspect(id, |t| t.priority) {
            inner.requeue(id, priority);
        }
        tracing::info!(task_id = %id, "task resumed");
        inner.publish(id, TaskEventKind::Resumed);
        true
    }

    /// Snapshot of `id`, or `None` if unknown.
    pub fn get_status(&self, id: TaskId) -> Option<TaskSnapshot<R>> {
        self.inner.registry.get(id)
    }

    /// Result of `id` if it COMPLETED.
    pub fn get_result(&self, id: TaskId) -> Option<R> {
        self.inner
            .registry
            .inspect(id, |t| t.result.clone().filter(|_| t.status == TaskStatus::Completed))
            .flatten()
    }

    /// Poll `id` until it is terminal. Returns the result when it completed,
    /// `None` when it failed, was cancelled, is unknown or `timeout` elapsed.
    pub async fn wait_for(&self, id: TaskId, timeout: Option<Duration>) -> Option<R> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let (status, result) = self.inner.registry.inspect(id, |t| (t.status, t.result.clone()))?;
            match status {
                TaskStatus::Completed => return result,
                TaskStatus::Failed | TaskStatus::Cancelled => return None,
                _ => {}
            }
            let mut pause = self.inner.timing.wait_poll;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    tracing::warn!(task_id = %id, "wait timed out");
                    return None;
                }
                pause = pause.min(deadline - now);
            }
            tokio::time::sleep(pause).await;
        }
    }

    /// Tasks holding a concurrency slot.
    pub fn running_count(&self) -> usize {
        self.inner.concurrency.running_count()
    }

    /// Queue sizes.
    pub fn queue_status(&self) -> QueueStatus {
        self.inner.queue.status()
    }

    /// Task types with a registered executor.
    pub fn task_types(&self) -> Vec<TaskType> {
        self.inner.executors.task_types()
    }

    /// Subscribe to lifecycle events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    /// Apply runtime adjustments. Nothing is changed if any value is invalid.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for zero limits or non-positive budgets.
    pub fn adjust_settings(&self, update: &SettingsUpdate) -> Result<(), SchedulerError> {
        update.validate()?;
        let inner = &self.inner;
        if let Some(limit) = update.max_concurrent {
            inner.concurrency.set_limit(limit)?;
        }
        if let Some(rpm) = update.requests_per_minute {
            inner.rate_limiter.set_requests_per_minute(rpm);
            tracing::info!(requests_per_minute = rpm, "rate limit updated");
        }
        if let Some(rph) = update.requests_per_hour {
            inner.rate_limiter.set_requests_per_hour(rph);
            tracing::info!(requests_per_hour = rph, "rate limit updated");
        }
        if let Some(upm) = update.units_per_minute {
            inner.rate_limiter.set_units_per_minute(upm);
            tracing::info!(units_per_minute = upm, "rate limit updated");
        }
        if update.budget_limit.is_some() || update.daily_limit.is_some() || update.hourly_limit.is_some() {
            inner
                .cost
                .adjust_limits(update.budget_limit, update.daily_limit, update.hourly_limit);
        }
        Ok(())
    }

    /// Current budget caps.
    pub fn budget_limits(&self) -> BudgetLimits {
        self.inner.cost.limits()
    }

    /// Zero the lifetime spend.
    pub fn reset_total_cost(&self) {
        self.inner.cost.reset_total();
    }

    /// Remove terminal tasks that finished more than `older_than` ago.
    pub fn cleanup_old_tasks(&self, older_than: Duration) -> usize {
        let removed = self.inner.registry.purge_completed(older_than);
        tracing::info!(removed, older_than_secs = older_than.as_secs(), "old tasks cleaned up");
        removed
    }

    /// Point-in-time view of every component.
    pub fn statistics(&self) -> SchedulerStatistics {
        let inner = &self.inner;
        let (running, uptime_ms) = self.worker.lock().as_ref().map_or((false, 0), |w| {
            (!w.join.is_finished(), millis(w.started_at.elapsed()))
        });
        SchedulerStatistics {
            status: SchedulerState {
                running,
                paused: self.is_paused(),
                uptime_ms,
            },
            queue: inner.queue.status(),
            concurrency: ConcurrencyStats {
                running_tasks: inner.concurrency.running_count(),
                max_concurrent: inner.concurrency.limit(),
                running_task_ids: inner.concurrency.running_ids(),
            },
            rate_limit: inner.rate_limiter.usage(),
            cost: inner.cost.usage(),
            tasks: inner.registry.stats(),
            performance: inner.counters.snapshot(),
        }
    }
}

impl<P, R> Drop for Scheduler<P, R>
where
    P: TaskPayload,
    R: TaskOutput,
{
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            handle.shutdown.cancel();
        }
    }
}
