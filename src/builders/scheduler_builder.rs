//! Builder to construct a scheduler from configuration.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{
    ConcurrencyController, CostController, ExecutorRegistry, PriorityQueue, RateLimiter, Scheduler,
    SchedulerError, SchedulerParts, TaskOutput, TaskPayload, TaskRegistry, WorkExecutor,
};
use crate::util::serde::TaskType;

/// Collects executors and turns a [`SchedulerConfig`] into a [`Scheduler`].
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new(SchedulerConfig::from_env()?)
///     .with_executor(TaskType::EmbeddingGeneration, Embedder::new(client))
///     .build()?;
/// scheduler.start()?;
/// ```
pub struct SchedulerBuilder<P, R>
where
    P: TaskPayload,
    R: TaskOutput,
{
    config: SchedulerConfig,
    executors: ExecutorRegistry<P, R>,
}

impl<P, R> SchedulerBuilder<P, R>
where
    P: TaskPayload,
    R: TaskOutput,
{
    /// Start from `config` with no executors.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            executors: ExecutorRegistry::new(),
        }
    }

    /// Register `executor` for `task_type`.
    #[must_use]
    pub fn with_executor<E>(mut self, task_type: TaskType, executor: E) -> Self
    where
        E: WorkExecutor<P, R>,
    {
        self.executors.register(task_type, executor);
        self
    }

    /// Register an executor shared with other schedulers.
    #[must_use]
    pub fn with_shared_executor(mut self, task_type: TaskType, executor: Arc<dyn WorkExecutor<P, R>>) -> Self {
        self.executors.register_shared(task_type, executor);
        self
    }

    /// Validate the config and assemble every component.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when validation fails or no executor is registered.
    pub fn build(self) -> Result<Scheduler<P, R>, SchedulerError> {
        let cfg = self.config;
        cfg.validate()
            .map_err(|e| SchedulerError::InvalidConfig(format!("config invalid: {e}")))?;
        if self.executors.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "at least one executor must be registered".into(),
            ));
        }

        tracing::info!(
            max_concurrent = cfg.max_concurrent,
            max_queue_size = cfg.max_queue_size,
            executors = self.executors.len(),
            "building scheduler"
        );
        Ok(Scheduler::new(SchedulerParts {
            queue: PriorityQueue::new(cfg.max_queue_size),
            registry: TaskRegistry::new(),
            concurrency: ConcurrencyController::new(cfg.max_concurrent)?,
            rate_limiter: RateLimiter::new((&cfg.rate_limits).into()),
            cost: CostController::new((&cfg.budget).into()),
            executors: self.executors,
            timing: (&cfg.timing).into(),
            event_buffer: cfg.event_buffer,
        }))
    }
}
