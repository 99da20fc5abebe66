//! Scheduler configuration structures.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{BudgetLimits, RateLimits, SchedulerTiming, MAX_CONCURRENT};

/// Prefix of every environment variable read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "WORK_SCHEDULER_";

/// Sliding-window rate limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per rolling minute.
    pub requests_per_minute: u32,
    /// Requests per rolling hour.
    pub requests_per_hour: u32,
    /// Resource units per rolling minute.
    pub units_per_minute: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let limits = RateLimits::default();
        Self {
            requests_per_minute: limits.requests_per_minute,
            requests_per_hour: limits.requests_per_hour,
            units_per_minute: limits.units_per_minute,
        }
    }
}

impl From<&RateLimitConfig> for RateLimits {
    fn from(cfg: &RateLimitConfig) -> Self {
        Self {
            requests_per_minute: cfg.requests_per_minute,
            requests_per_hour: cfg.requests_per_hour,
            units_per_minute: cfg.units_per_minute,
        }
    }
}

/// Spending caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Lifetime cap.
    pub total_limit: f64,
    /// Rolling 24h cap.
    pub daily_limit: f64,
    /// Rolling 1h cap.
    pub hourly_limit: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        let limits = BudgetLimits::default();
        Self {
            total_limit: limits.total,
            daily_limit: limits.daily,
            hourly_limit: limits.hourly,
        }
    }
}

impl From<&BudgetConfig> for BudgetLimits {
    fn from(cfg: &BudgetConfig) -> Self {
        Self {
            total: cfg.total_limit,
            daily: cfg.daily_limit,
            hourly: cfg.hourly_limit,
        }
    }
}

/// Dispatch loop poll intervals, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Sleep when the queue is empty.
    pub idle_poll_ms: u64,
    /// Sleep while globally paused.
    pub pause_poll_ms: u64,
    /// `wait_for` status poll interval.
    pub wait_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            idle_poll_ms: 500,
            pause_poll_ms: 1000,
            wait_poll_ms: 500,
        }
    }
}

impl From<&TimingConfig> for SchedulerTiming {
    fn from(cfg: &TimingConfig) -> Self {
        Self {
            idle_poll: Duration::from_millis(cfg.idle_poll_ms),
            pause_poll: Duration::from_millis(cfg.pause_poll_ms),
            wait_poll: Duration::from_millis(cfg.wait_poll_ms),
        }
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Simultaneously running tasks.
    pub max_concurrent: usize,
    /// Queued tasks before `submit` is refused.
    pub max_queue_size: usize,
    /// Rate windows.
    pub rate_limits: RateLimitConfig,
    /// Spending caps.
    pub budget: BudgetConfig,
    /// Poll intervals.
    pub timing: TimingConfig,
    /// Lifecycle event channel capacity.
    pub event_buffer: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_queue_size: 10_000,
            rate_limits: RateLimitConfig::default(),
            budget: BudgetConfig::default(),
            timing: TimingConfig::default(),
            event_buffer: 1024,
        }
    }
}

fn positive_budget(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be a finite number greater than 0"))
    }
}

fn override_from<T, F>(lookup: &F, key: &str, slot: &mut T) -> Result<(), String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let name = format!("{ENV_PREFIX}{key}");
    if let Some(raw) = lookup(&name) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{name}: cannot parse `{raw}`: {e}"))?;
    }
    Ok(())
}

impl SchedulerConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// A message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 || self.max_concurrent > MAX_CONCURRENT {
            return Err(format!("max_concurrent must be between 1 and {MAX_CONCURRENT}"));
        }
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be greater than 0".into());
        }
        if self.rate_limits.requests_per_minute == 0 {
            return Err("rate_limits.requests_per_minute must be greater than 0".into());
        }
        if self.rate_limits.requests_per_hour == 0 {
            return Err("rate_limits.requests_per_hour must be greater than 0".into());
        }
        if self.rate_limits.units_per_minute == 0 {
            return Err("rate_limits.units_per_minute must be greater than 0".into());
        }
        positive_budget("budget.total_limit", self.budget.total_limit)?;
        positive_budget("budget.daily_limit", self.budget.daily_limit)?;
        positive_budget("budget.hourly_limit", self.budget.hourly_limit)?;
        if self.timing.idle_poll_ms == 0 || self.timing.pause_poll_ms == 0 || self.timing.wait_poll_ms == 0 {
            return Err("timing poll intervals must be greater than 0".into());
        }
        if self.event_buffer == 0 || self.event_buffer > usize::MAX / 2 {
            return Err("event_buffer must be between 1 and usize::MAX / 2".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Parse failures and validation failures.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `.env` if present, then apply `WORK_SCHEDULER_*` overrides to the
    /// defaults and validate.
    ///
    /// # Errors
    ///
    /// Unparsable variables and validation failures.
    pub fn from_env() -> Result<Self, String> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to load .env");
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`] but reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Unparsable variables and validation failures.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        override_from(&lookup, "MAX_CONCURRENT", &mut cfg.max_concurrent)?;
        override_from(&lookup, "MAX_QUEUE_SIZE", &mut cfg.max_queue_size)?;
        override_from(&lookup, "REQUESTS_PER_MINUTE", &mut cfg.rate_limits.requests_per_minute)?;
        override_from(&lookup, "REQUESTS_PER_HOUR", &mut cfg.rate_limits.requests_per_hour)?;
        override_from(&lookup, "UNITS_PER_MINUTE", &mut cfg.rate_limits.units_per_minute)?;
        override_from(&lookup, "BUDGET_TOTAL", &mut cfg.budget.total_limit)?;
        override_from(&lookup, "BUDGET_DAILY", &mut cfg.budget.daily_limit)?;
        override_from(&lookup, "BUDGET_HOURLY", &mut cfg.budget.hourly_limit)?;
        override_from(&lookup, "IDLE_POLL_MS", &mut cfg.timing.idle_poll_ms)?;
        override_from(&lookup, "PAUSE_POLL_MS", &mut cfg.timing.pause_poll_ms)?;
        override_from(&lookup, "WAIT_POLL_MS", &mut cfg.timing.wait_poll_ms)?;
        override_from(&lookup, "EVENT_BUFFER", &mut cfg.event_buffer)?;
        cfg.validate()?;
        Ok(cfg)
    }
}
