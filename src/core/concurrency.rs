//! Concurrency controller: a counting semaphore guarding the running set.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::core::SchedulerError;
use crate::util::serde::TaskId;

/// Largest limit the controller accepts.
pub const MAX_CONCURRENT: usize = Semaphore::MAX_PERMITS;

fn check_limit(limit: usize) -> Result<(), SchedulerError> {
    if limit == 0 || limit > MAX_CONCURRENT {
        return Err(SchedulerError::InvalidConfig(format!(
            "max_concurrent must be between 1 and {MAX_CONCURRENT}, got {limit}"
        )));
    }
    Ok(())
}

struct RunningState {
    limit: usize,
    /// Permits still to be retired after the limit was lowered below the
    /// number of permits in use.
    pending_shrink: usize,
    running: HashSet<TaskId>,
}

struct ControllerInner {
    semaphore: Arc<Semaphore>,
    state: Mutex<RunningState>,
}

impl ControllerInner {
    fn finish(&self, id: Option<TaskId>, permit: OwnedSemaphorePermit) {
        let mut state = self.state.lock();
        if let Some(id) = id {
            state.running.remove(&id);
        }
        if state.pending_shrink > 0 {
            state.pending_shrink -= 1;
            permit.forget();
        } else {
            drop(permit);
        }
    }
}

/// Bounds the number of simultaneously executing tasks.
#[derive(Clone)]
pub struct ConcurrencyController {
    inner: Arc<ControllerInner>,
}

/// A free execution slot not yet bound to a task.
///
/// Dropping it returns the slot.
pub struct ConcurrencyPermit {
    inner: Arc<ControllerInner>,
    permit: Option<OwnedSemaphorePermit>,
}

impl ConcurrencyPermit {
    /// Bind the slot to `id`, adding it to the running set.
    #[must_use]
    pub fn assign(mut self, id: TaskId) -> RunningSlot {
        self.inner.state.lock().running.insert(id);
        RunningSlot {
            inner: Arc::clone(&self.inner),
            id,
            permit: self.permit.take(),
        }
    }
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.inner.finish(None, permit);
        }
    }
}

/// Slot held by a running task. Dropping it releases the slot and removes
/// the task from the running set, whatever the outcome of the attempt.
pub struct RunningSlot {
    inner: Arc<ControllerInner>,
    id: TaskId,
    permit: Option<OwnedSemaphorePermit>,
}

impl RunningSlot {
    /// Task holding the slot.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.id
    }

    /// Release explicitly. Equivalent to dropping.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for RunningSlot {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.inner.finish(Some(self.id), permit);
        }
    }
}

impl ConcurrencyController {
    /// Controller allowing `max_concurrent` simultaneous tasks.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when `max_concurrent` is zero or above [`MAX_CONCURRENT`].
    pub fn new(max_concurrent: usize) -> Result<Self, SchedulerError> {
        check_limit(max_concurrent)?;
        Ok(Self {
            inner: Arc::new(ControllerInner {
                semaphore: Arc::new(Semaphore::new(max_concurrent)),
                state: Mutex::new(RunningState {
                    limit: max_concurrent,
                    pending_shrink: 0,
                    running: HashSet::new(),
                }),
            }),
        })
    }

    /// Wait for a free slot without binding it to a task yet.
    ///
    /// # Errors
    ///
    /// `Closed` if the underlying semaphore was closed.
    pub async fn reserve(&self) -> Result<ConcurrencyPermit, SchedulerError> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| SchedulerError::Closed)?;
        Ok(ConcurrencyPermit {
            inner: Arc::clone(&self.inner),
            permit: Some(permit),
        })
    }

    /// Wait for a free slot and mark `id` as running.
    ///
    /// # Errors
    ///
    /// `Closed` if the underlying semaphore was closed.
    pub async fn acquire(&self, id: TaskId) -> Result<RunningSlot, SchedulerError> {
        Ok(self.reserve().await?.assign(id))
    }

    /// Take a slot only if one is free right now.
    #[must_use]
    pub fn try_acquire(&self, id: TaskId) -> Option<RunningSlot> {
        let permit = Arc::clone(&self.inner.semaphore).try_acquire_owned().ok()?;
        let reserved = ConcurrencyPermit {
            inner: Arc::clone(&self.inner),
            permit: Some(permit),
        };
        Some(reserved.assign(id))
    }

    /// Tasks currently holding a slot.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.inner.state.lock().running.len()
    }

    /// Ids of tasks currently holding a slot.
    #[must_use]
    pub fn running_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<_> = self.inner.state.lock().running.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Configured limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.inner.state.lock().limit
    }

    /// Change the limit. Raising it frees slots immediately; lowering it
    /// retires slots as running tasks finish, never evicting them.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when `limit` is zero or above [`MAX_CONCURRENT`].
    pub fn set_limit(&self, limit: usize) -> Result<(), SchedulerError> {
        check_limit(limit)?;
        let mut state = self.inner.state.lock();
        let old = state.limit;
        if limit > old {
            let mut grow = limit - old;
            // Cancel pending retirements before minting new permits.
            let cancelled = grow.min(state.pending_shrink);
            state.pending_shrink -= cancelled;
            grow -= cancelled;
            if grow > 0 {
                self.inner.semaphore.add_permits(grow);
            }
        } else if limit < old {
            let shrink = old - limit;
            let forgotten = self.inner.semaphore.forget_permits(shrink);
            state.pending_shrink += shrink - forgotten;
        }
        state.limit = limit;
        tracing::info!(old, new = limit, "concurrency limit updated");
        Ok(())
    }
}
