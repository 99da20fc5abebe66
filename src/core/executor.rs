//! Work executor traits, payload abstraction and the executor registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, Progress, ProgressCallback, SchedulerError, TaskConfig};
use crate::util::serde::{Priority, TaskId, TaskType};

/// Marker trait for task payloads.
///
/// Payloads are cloned into every attempt so a retry sees the original data,
/// and must be `Serialize + Deserialize` so callers can ship them around.
pub trait TaskPayload: Send + Sync + Clone + Serialize + for<'de> Deserialize<'de> + 'static {}

/// Blanket implementation: any type meeting the requirements is a `TaskPayload`.
impl<T> TaskPayload for T where T: Send + Sync + Clone + Serialize + for<'de> Deserialize<'de> + 'static {}

/// Marker trait for executor results stored on completed tasks.
pub trait TaskOutput: Send + Sync + Clone + Serialize + 'static {}

impl<T> TaskOutput for T where T: Send + Sync + Clone + Serialize + 'static {}

/// Successful executor outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput<R> {
    /// Value stored as the task result.
    pub result: R,
    /// Spend recorded against the budget.
    pub actual_cost: f64,
    /// Resource units actually consumed.
    pub units_used: u64,
}

impl<R> ExecutionOutput<R> {
    /// Output with zero cost and usage.
    pub const fn new(result: R) -> Self {
        Self {
            result,
            actual_cost: 0.0,
            units_used: 0,
        }
    }

    /// Set the actual cost.
    #[must_use]
    pub fn with_cost(mut self, actual_cost: f64) -> Self {
        self.actual_cost = actual_cost;
        self
    }

    /// Set the units consumed.
    #[must_use]
    pub fn with_units(mut self, units_used: u64) -> Self {
        self.units_used = units_used;
        self
    }
}

/// Forwards executor progress to the task's progress callback.
#[derive(Clone)]
pub struct ProgressReporter {
    task_id: TaskId,
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub(crate) fn new(task_id: TaskId, callback: Option<ProgressCallback>) -> Self {
        Self { task_id, callback }
    }

    /// Report `completed` out of `total`. Callback failures are logged only.
    pub fn report(&self, completed: u64, total: u64) {
        let Some(callback) = self.callback.as_ref() else {
            return;
        };
        #[allow(clippy::cast_precision_loss)]
        let fraction = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };
        let progress = Progress {
            task_id: self.task_id,
            completed,
            total,
            fraction,
        };
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(progress)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let err = SchedulerError::Callback(format!("{e:#}"));
                tracing::error!(task_id = %self.task_id, callback = "progress", error = %err, "callback failed");
            }
            Err(_) => {
                tracing::error!(task_id = %self.task_id, callback = "progress", "callback panicked");
            }
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("task_id", &self.task_id)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Per-attempt context handed to executors.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Task being executed.
    pub task_id: TaskId,
    /// Executor selector.
    pub task_type: TaskType,
    /// Dispatch priority.
    pub priority: Priority,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Advisory timeout from the task config.
    pub timeout: Option<Duration>,
    /// Units estimated at submission.
    pub estimated_units: u64,
    /// Progress sink.
    pub progress: ProgressReporter,
}

/// Performs the domain work for one task type.
///
/// The scheduler never looks inside: it hands over the payload, and reads back
/// the result plus the actual cost. Returning `Err` fails the attempt and
/// drives the retry policy.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_work_scheduler::core::{AppResult, ExecutionContext, ExecutionOutput, WorkExecutor};
///
/// struct Embedder;
///
/// #[async_trait]
/// impl WorkExecutor<String, Vec<f32>> for Embedder {
///     async fn execute(&self, text: String, _ctx: ExecutionContext) -> AppResult<ExecutionOutput<Vec<f32>>> {
///         let vector = embed(&text).await?;
///         Ok(ExecutionOutput::new(vector).with_cost(0.0001))
///     }
/// }
/// ```
#[async_trait]
pub trait WorkExecutor<P, R>: Send + Sync + 'static
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Run one attempt.
    async fn execute(&self, payload: P, ctx: ExecutionContext) -> AppResult<ExecutionOutput<R>>;

    /// Cost estimate used for budget admission at submit time.
    fn estimate_cost(&self, _payload: &P, config: &TaskConfig<R>) -> f64 {
        config.estimated_cost
    }
}

/// Adapter turning an async closure into a [`WorkExecutor`].
pub struct FnExecutor<F> {
    f: F,
}

/// Wrap `f` as an executor.
pub fn executor_fn<P, R, F, Fut>(f: F) -> FnExecutor<F>
where
    F: Fn(P, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<ExecutionOutput<R>>> + Send + 'static,
{
    FnExecutor { f }
}

#[async_trait]
impl<P, R, F, Fut> WorkExecutor<P, R> for FnExecutor<F>
where
    P: Send + 'static,
    R: Send + 'static,
    F: Fn(P, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<ExecutionOutput<R>>> + Send + 'static,
{
    async fn execute(&self, payload: P, ctx: ExecutionContext) -> AppResult<ExecutionOutput<R>> {
        (self.f)(payload, ctx).await
    }
}

/// Mapping from task type to executor, fixed once the scheduler is built.
pub struct ExecutorRegistry<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    executors: HashMap<TaskType, Arc<dyn WorkExecutor<P, R>>>,
}

impl<P, R> ExecutorRegistry<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Register `executor` for `task_type`, replacing any previous one.
    pub fn register<E>(&mut self, task_type: TaskType, executor: E)
    where
        E: WorkExecutor<P, R>,
    {
        self.register_shared(task_type, Arc::new(executor));
    }

    /// Register an already shared executor.
    pub fn register_shared(&mut self, task_type: TaskType, executor: Arc<dyn WorkExecutor<P, R>>) {
        if self.executors.insert(task_type.clone(), executor).is_some() {
            tracing::warn!(task_type = %task_type, "executor replaced");
        }
    }

    /// Executor for `task_type`.
    #[must_use]
    pub fn get(&self, task_type: &TaskType) -> Option<Arc<dyn WorkExecutor<P, R>>> {
        self.executors.get(task_type).cloned()
    }

    /// Whether an executor handles `task_type`.
    #[must_use]
    pub fn contains(&self, task_type: &TaskType) -> bool {
        self.executors.contains_key(task_type)
    }

    /// Registered task types.
    #[must_use]
    pub fn task_types(&self) -> Vec<TaskType> {
        let mut types: Vec<_> = self.executors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of registered executors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl<P, R> Default for ExecutorRegistry<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
