//! Lifetime throughput counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Aggregate outcome counts since the scheduler was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    /// Tasks accepted by `submit`.
    pub total_submitted: u64,
    /// Tasks that reached COMPLETED or FAILED.
    pub total_processed: u64,
    /// Tasks that reached COMPLETED.
    pub total_succeeded: u64,
    /// Tasks that reached FAILED.
    pub total_failed: u64,
    /// Tasks cancelled before running.
    pub total_cancelled: u64,
    /// Retries scheduled across all tasks.
    pub total_retried: u64,
    /// Submissions refused at admission.
    pub total_rejected: u64,
    /// `succeeded / processed * 100`, 0 when nothing was processed.
    pub success_rate: f64,
}

/// Internal counters for scheduler statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct SchedulerCounters {
    pub submitted: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub retried: AtomicU64,
    pub rejected: AtomicU64,
}

impl SchedulerCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> PerformanceStats {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let processed = succeeded + failed;
        #[allow(clippy::cast_precision_loss)]
        let success_rate = if processed == 0 {
            0.0
        } else {
            succeeded as f64 / processed as f64 * 100.0
        };
        PerformanceStats {
            total_submitted: self.submitted.load(Ordering::Relaxed),
            total_processed: processed,
            total_succeeded: succeeded,
            total_failed: failed,
            total_cancelled: self.cancelled.load(Ordering::Relaxed),
            total_retried: self.retried.load(Ordering::Relaxed),
            total_rejected: self.rejected.load(Ordering::Relaxed),
            success_rate,
        }
    }
}
