//! Budget tracking across total, daily and hourly windows.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::core::{BudgetWindow, SchedulerError};

const DAY: Duration = Duration::from_secs(86_400);
const HOUR: Duration = Duration::from_secs(3_600);

/// Tolerance for floating-point budget comparisons.
const EPSILON: f64 = 1e-9;

/// Spending caps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetLimits {
    /// Cap on all-time spend.
    pub total: f64,
    /// Cap on spend in the rolling 24h window.
    pub daily: f64,
    /// Cap on spend in the rolling 1h window.
    pub hourly: f64,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            total: 100.0,
            daily: 10.0,
            hourly: 1.0,
        }
    }
}

/// Spend against one cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetUsage {
    /// Spend recorded in the window.
    pub cost: f64,
    /// Cap for the window.
    pub limit: f64,
    /// `limit - cost`, floored at zero.
    pub remaining: f64,
    /// `cost / limit * 100`; zero when the limit is zero.
    pub percentage: f64,
}

impl BudgetUsage {
    fn new(cost: f64, limit: f64) -> Self {
        let percentage = if limit > 0.0 { cost / limit * 100.0 } else { 0.0 };
        Self {
            cost,
            limit,
            remaining: (limit - cost).max(0.0),
            percentage,
        }
    }
}

/// Spend against every cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostUsage {
    /// All-time spend.
    pub total: BudgetUsage,
    /// Last 24 hours.
    pub daily: BudgetUsage,
    /// Last hour.
    pub hourly: BudgetUsage,
}

#[derive(Default)]
struct Ledger {
    total: f64,
    daily: VecDeque<(Instant, f64)>,
    hourly: VecDeque<(Instant, f64)>,
}

fn prune(window: &mut VecDeque<(Instant, f64)>, span: Duration, now: Instant) {
    while window.front().is_some_and(|(t, _)| now.duration_since(*t) >= span) {
        window.pop_front();
    }
}

fn sum(window: &VecDeque<(Instant, f64)>) -> f64 {
    window.iter().map(|(_, c)| c).sum()
}

impl Ledger {
    fn prune(&mut self, now: Instant) {
        prune(&mut self.daily, DAY, now);
        prune(&mut self.hourly, HOUR, now);
    }

    /// First cap that `estimated` would break, with the projected spend.
    fn first_breach(&self, limits: &BudgetLimits, estimated: f64) -> Option<(BudgetWindow, f64, f64)> {
        [
            (BudgetWindow::Total, self.total, limits.total),
            (BudgetWindow::Daily, sum(&self.daily), limits.daily),
            (BudgetWindow::Hourly, sum(&self.hourly), limits.hourly),
        ]
        .into_iter()
        .map(|(window, spent, limit)| (window, spent + estimated, limit))
        .find(|(_, projected, limit)| *projected > *limit + EPSILON)
    }
}

/// Tracks spend and gates admission against the configured caps.
///
/// Admission is advisory: the estimate is checked, but only the actual cost
/// reported after execution is recorded.
pub struct CostController {
    limits: Mutex<BudgetLimits>,
    ledger: Mutex<Ledger>,
}

impl CostController {
    /// Controller with the given caps and nothing spent.
    #[must_use]
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits: Mutex::new(limits),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// True when `estimated` fits under every cap.
    pub fn check_budget(&self, estimated: f64) -> bool {
        self.admit(estimated).is_ok()
    }

    /// Check `estimated` against every cap.
    ///
    /// # Errors
    ///
    /// `BudgetExceeded` naming the first cap (total, daily, hourly) that the
    /// estimate would break.
    pub fn admit(&self, estimated: f64) -> Result<(), SchedulerError> {
        let limits = *self.limits.lock();
        let mut ledger = self.ledger.lock();
        ledger.prune(Instant::now());
        match ledger.first_breach(&limits, estimated.max(0.0)) {
            None => Ok(()),
            Some((window, projected, limit)) => {
                tracing::warn!(%window, projected, limit, estimated, "budget exceeded");
                Err(SchedulerError::BudgetExceeded {
                    window,
                    projected,
                    limit,
                })
            }
        }
    }

    /// Record spend. Non-positive or non-finite amounts are ignored.
    pub fn record_cost(&self, cost: f64) {
        if !cost.is_finite() || cost <= 0.0 {
            return;
        }
        let now = Instant::now();
        let mut ledger = self.ledger.lock();
        ledger.prune(now);
        ledger.total += cost;
        ledger.daily.push_back((now, cost));
        ledger.hourly.push_back((now, cost));
        tracing::debug!(cost, total = ledger.total, "cost recorded");
    }

    /// Current caps.
    pub fn limits(&self) -> BudgetLimits {
        *self.limits.lock()
    }

    /// Replace the caps that are `Some`.
    pub fn adjust_limits(&self, total: Option<f64>, daily: Option<f64>, hourly: Option<f64>) {
        let mut limits = self.limits.lock();
        if let Some(v) = total {
            limits.total = v;
        }
        if let Some(v) = daily {
            limits.daily = v;
        }
        if let Some(v) = hourly {
            limits.hourly = v;
        }
        tracing::info!(total = limits.total, daily = limits.daily, hourly = limits.hourly, "budget limits updated");
    }

    /// Zero the all-time spend. Rolling windows are untouched.
    pub fn reset_total(&self) {
        self.ledger.lock().total = 0.0;
        tracing::info!("total spend reset");
    }

    /// All-time spend.
    pub fn total_cost(&self) -> f64 {
        self.ledger.lock().total
    }

    /// Spend against each cap after pruning.
    pub fn usage(&self) -> CostUsage {
        let limits = *self.limits.lock();
        let mut ledger = self.ledger.lock();
        ledger.prune(Instant::now());
        CostUsage {
            total: BudgetUsage::new(ledger.total, limits.total),
            daily: BudgetUsage::new(sum(&ledger.daily), limits.daily),
            hourly: BudgetUsage::new(sum(&ledger.hourly), limits.hourly),
        }
    }
}

impl Default for CostController {
    fn default() -> Self {
        Self::new(BudgetLimits::default())
    }
}
