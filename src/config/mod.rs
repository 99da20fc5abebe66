//! Configuration models for the scheduler and its components.

pub mod scheduler;

pub use scheduler::{BudgetConfig, RateLimitConfig, SchedulerConfig, TimingConfig, ENV_PREFIX};
