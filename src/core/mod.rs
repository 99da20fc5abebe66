//! Core scheduling components and the scheduler that wires them together.

pub mod concurrency;
pub mod cost;
pub mod error;
pub mod events;
pub mod executor;
pub mod queue;
pub mod rate_limiter;
pub mod registry;
pub mod scheduler;
pub mod stats;
pub mod task;

pub use concurrency::{ConcurrencyController, ConcurrencyPermit, RunningSlot, MAX_CONCURRENT};
pub use cost::{BudgetLimits, BudgetUsage, CostController, CostUsage};
pub use error::{AppResult, BudgetWindow, SchedulerError};
pub use events::{TaskEvent, TaskEventKind};
pub use executor::{
    executor_fn, ExecutionContext, ExecutionOutput, ExecutorRegistry, FnExecutor, ProgressReporter,
    TaskOutput, TaskPayload, WorkExecutor,
};
pub use queue::{PriorityQueue, QueueEntry, QueueStatus};
pub use rate_limiter::{RateLimitUsage, RateLimiter, RateLimits, WindowUsage};
pub use registry::{AttemptTicket, RegistryStats, TaskRegistry};
pub use scheduler::{
    ConcurrencyStats, Scheduler, SchedulerParts, SchedulerState, SchedulerStatistics, SchedulerTiming,
    SettingsUpdate, TaskRequest,
};
pub use stats::PerformanceStats;
pub use task::{
    Progress, ProgressCallback, Task, TaskCallback, TaskConfig, TaskMetrics, TaskSnapshot, TaskStatus,
};
