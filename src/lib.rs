//! # Prometheus Work Scheduler
//!
//! An async work scheduler for rate-limited, budgeted workloads such as calls
//! to paid AI APIs.
//!
//! Callers submit tasks tagged with a type, a priority and a cost estimate.
//! The scheduler admits them against a spending budget, holds them in a
//! four-level priority queue, and dispatches them under a global concurrency
//! cap and sliding-window rate limits. Failed attempts are retried with
//! exponential backoff; every task's lifecycle and timings can be queried at
//! any point.
//!
//! ## Core Problem Solved
//!
//! Remote AI services bill per call and throttle aggressively:
//!
//! - **Spend limits**: lifetime, daily and hourly budgets must hold, so
//!   expensive work is refused up front instead of failing mid-flight
//! - **Provider rate limits**: requests per minute/hour and tokens per minute
//!   are enforced locally so calls are delayed, never dropped
//! - **Bounded parallelism**: at most `max_concurrent` executors run at once
//! - **Transient failures**: attempts are retried with backoff before a task
//!   is declared failed
//!
//! ## Components
//!
//! - [`core::PriorityQueue`]: URGENT > HIGH > MEDIUM > LOW, FIFO within a level
//! - [`core::TaskRegistry`]: task records and the validated status state machine
//! - [`core::ConcurrencyController`]: semaphore-backed running set
//! - [`core::RateLimiter`]: requests/min, requests/hour and units/min windows
//! - [`core::CostController`]: total, daily and hourly budgets
//! - [`core::Scheduler`]: the dispatch loop wiring them together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use prometheus_work_scheduler::builders::SchedulerBuilder;
//! use prometheus_work_scheduler::config::SchedulerConfig;
//! use prometheus_work_scheduler::core::{executor_fn, ExecutionOutput, TaskConfig};
//! use prometheus_work_scheduler::util::serde::{Priority, TaskType};
//!
//! let scheduler = SchedulerBuilder::<String, usize>::new(SchedulerConfig::default())
//!     .with_executor(
//!         TaskType::TextClassification,
//!         executor_fn(|text: String, _ctx| async move {
//!             Ok(ExecutionOutput::new(text.len()).with_cost(0.002))
//!         }),
//!     )
//!     .build()?;
//! scheduler.start()?;
//!
//! let id = scheduler.submit(
//!     TaskType::TextClassification,
//!     "is this spam?".to_string(),
//!     Priority::High,
//!     TaskConfig::new().with_estimated_cost(0.002),
//! )?;
//! let result = scheduler.wait_for(id, Some(Duration::from_secs(30))).await;
//! scheduler.stop().await;
//! ```
//!
//! Admission is advisory: the budget check uses estimates and concurrent
//! submissions can pass it before any of them records actual spend.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling components and the scheduler.
pub mod core;
/// Configuration models and environment loading.
pub mod config;
/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
