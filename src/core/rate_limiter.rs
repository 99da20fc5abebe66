//! Sliding-window rate limiter.
//!
//! Three windows are tracked: requests per minute, requests per hour and
//! resource units per minute. Entries are pruned lazily on every access.
//! `acquire` never rejects; it sleeps until every window has headroom.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Window capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimits {
    /// Requests admitted per rolling minute.
    pub requests_per_minute: u32,
    /// Requests admitted per rolling hour.
    pub requests_per_hour: u32,
    /// Resource units admitted per rolling minute.
    pub units_per_minute: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 3600,
            units_per_minute: 90_000,
        }
    }
}

/// Usage of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowUsage {
    /// Amount recorded in the window.
    pub current: u64,
    /// Window capacity.
    pub limit: u64,
    /// `limit - current`, floored at zero.
    pub available: u64,
}

impl WindowUsage {
    const fn new(current: u64, limit: u64) -> Self {
        Self {
            current,
            limit,
            available: limit.saturating_sub(current),
        }
    }
}

/// Usage across all three windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitUsage {
    /// Requests in the last minute.
    pub requests_per_minute: WindowUsage,
    /// Requests in the last hour.
    pub requests_per_hour: WindowUsage,
    /// Units in the last minute.
    pub units_per_minute: WindowUsage,
}

struct Windows {
    limits: RateLimits,
    minute_requests: VecDeque<Instant>,
    hour_requests: VecDeque<Instant>,
    minute_units: VecDeque<(Instant, u64)>,
    minute_units_total: u64,
}

impl Windows {
    fn prune(&mut self, now: Instant) {
        while self
            .minute_requests
            .front()
            .is_some_and(|t| now.duration_since(*t) >= MINUTE)
        {
            self.minute_requests.pop_front();
        }
        while self
            .hour_requests
            .front()
            .is_some_and(|t| now.duration_since(*t) >= HOUR)
        {
            self.hour_requests.pop_front();
        }
        while let Some(&(t, units)) = self.minute_units.front() {
            if now.duration_since(t) < MINUTE {
                break;
            }
            self.minute_units.pop_front();
            self.minute_units_total -= units;
        }
    }

    /// Time until the first saturated window frees up, or `None` if all
    /// three windows have headroom for `units`.
    fn wait_needed(&self, now: Instant, units: u64) -> Option<Duration> {
        let until_expiry = |t: Instant, window: Duration| window.saturating_sub(now.duration_since(t));

        if self.minute_requests.len() >= self.limits.requests_per_minute as usize {
            if let Some(&oldest) = self.minute_requests.front() {
                return Some(until_expiry(oldest, MINUTE));
            }
        }
        if self.hour_requests.len() >= self.limits.requests_per_hour as usize {
            if let Some(&oldest) = self.hour_requests.front() {
                return Some(until_expiry(oldest, HOUR));
            }
        }
        // An oversized request still goes through once the window is empty.
        if self.minute_units_total.saturating_add(units) > self.limits.units_per_minute {
            if let Some(&(oldest, _)) = self.minute_units.front() {
                return Some(until_expiry(oldest, MINUTE));
            }
        }
        None
    }

    fn record(&mut self, now: Instant, units: u64) {
        self.minute_requests.push_back(now);
        self.hour_requests.push_back(now);
        self.minute_units.push_back((now, units));
        self.minute_units_total += units;
    }
}

/// Rate limiter over rolling minute and hour windows.
pub struct RateLimiter {
    windows: Mutex<Windows>,
}

impl RateLimiter {
    /// Limiter with the given capacities.
    #[must_use]
    pub fn new(limits: RateLimits) -> Self {
        Self {
            windows: Mutex::new(Windows {
                limits,
                minute_requests: VecDeque::new(),
                hour_requests: VecDeque::new(),
                minute_units: VecDeque::new(),
                minute_units_total: 0,
            }),
        }
    }

    /// Wait until every window has headroom, then record one request of
    /// `units`. The lock is never held across the sleep.
    pub async fn acquire(&self, units: u64) {
        loop {
            let wait = match self.try_acquire(units) {
                Ok(()) => return,
                Err(wait) => wait,
            };
            tracing::debug!(wait_ms = wait.as_millis(), units, "rate limit reached, waiting");
            // A zero wait can only come from clock granularity; yield instead of spinning.
            if wait.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(wait).await;
            }
        }
    }

    /// Record a request if all windows have headroom now, otherwise return
    /// how long until the first saturated window frees up.
    ///
    /// # Errors
    ///
    /// The wait needed before the request could be admitted.
    pub fn try_acquire(&self, units: u64) -> Result<(), Duration> {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        windows.prune(now);
        if let Some(wait) = windows.wait_needed(now, units) {
            return Err(wait);
        }
        windows.record(now, units);
        Ok(())
    }

    /// Current capacities.
    pub fn limits(&self) -> RateLimits {
        self.windows.lock().limits
    }

    /// Replace all capacities.
    pub fn set_limits(&self, limits: RateLimits) {
        self.windows.lock().limits = limits;
    }

    /// Change the requests-per-minute capacity.
    pub fn set_requests_per_minute(&self, limit: u32) {
        self.windows.lock().limits.requests_per_minute = limit;
    }

    /// Change the requests-per-hour capacity.
    pub fn set_requests_per_hour(&self, limit: u32) {
        self.windows.lock().limits.requests_per_hour = limit;
    }

    /// Change the units-per-minute capacity.
    pub fn set_units_per_minute(&self, limit: u64) {
        self.windows.lock().limits.units_per_minute = limit;
    }

    /// Usage of each window after pruning.
    pub fn usage(&self) -> RateLimitUsage {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        windows.prune(now);
        RateLimitUsage {
            requests_per_minute: WindowUsage::new(
                windows.minute_requests.len() as u64,
                u64::from(windows.limits.requests_per_minute),
            ),
            requests_per_hour: WindowUsage::new(
                windows.hour_requests.len() as u64,
                u64::from(windows.limits.requests_per_hour),
            ),
            units_per_minute: WindowUsage::new(windows.minute_units_total, windows.limits.units_per_minute),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(rpm: u32, rph: u32, upm: u64) -> RateLimits {
        RateLimits {
            requests_per_minute: rpm,
            requests_per_hour: rph,
            units_per_minute: upm,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn minute_window_blocks_then_frees() {
        let limiter = RateLimiter::new(limits(2, 100, 1_000));
        assert!(limiter.try_acquire(1).is_ok());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.try_acquire(1).is_ok());

        let wait = limiter.try_acquire(1).unwrap_err();
        assert_eq!(wait, Duration::from_secs(50));

        tokio::time::advance(wait).await;
        assert!(limiter.try_acquire(1).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_sleeps_until_headroom() {
        let limiter = RateLimiter::new(limits(3, 100, 1_000));
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire(0).await;
        }
        // Requests 4 and 5 wait for the first to leave the minute window.
        assert!(start.elapsed() >= MINUTE);
        assert!(start.elapsed() < MINUTE * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn units_window_is_enforced() {
        let limiter = RateLimiter::new(limits(100, 1_000, 100));
        assert!(limiter.try_acquire(70).is_ok());
        assert!(limiter.try_acquire(40).is_err());
        assert!(limiter.try_acquire(30).is_ok());

        let usage = limiter.usage();
        assert_eq!(usage.units_per_minute.current, 100);
        assert_eq!(usage.units_per_minute.available, 0);
        assert_eq!(usage.requests_per_minute.current, 2);

        tokio::time::advance(MINUTE).await;
        assert_eq!(limiter.usage().units_per_minute.current, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_request_admitted_on_empty_window() {
        let limiter = RateLimiter::new(limits(100, 1_000, 50));
        assert!(limiter.try_acquire(500).is_ok());
        assert!(limiter.try_acquire(1).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn hour_window_outlasts_minute_window() {
        let limiter = RateLimiter::new(limits(10, 2, 1_000));
        assert!(limiter.try_acquire(0).is_ok());
        assert!(limiter.try_acquire(0).is_ok());
        tokio::time::advance(MINUTE * 2).await;
        let wait = limiter.try_acquire(0).unwrap_err();
        assert_eq!(wait, HOUR - MINUTE * 2);
        assert_eq!(limiter.usage().requests_per_minute.current, 0);
        assert_eq!(limiter.usage().requests_per_hour.current, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn raised_limit_applies_immediately() {
        let limiter = RateLimiter::new(limits(1, 100, 1_000));
        assert!(limiter.try_acquire(0).is_ok());
        assert!(limiter.try_acquire(0).is_err());
        limiter.set_requests_per_minute(2);
        assert!(limiter.try_acquire(0).is_ok());
        assert_eq!(limiter.limits().requests_per_minute, 2);
    }
}
