//! Four-level priority queue with FIFO order inside each level.
//!
//! `pop` scans URGENT, HIGH, MEDIUM, LOW and takes the head of the first
//! non-empty level. Lower levels can starve under sustained higher-priority
//! load; there is no aging.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;
use serde::Serialize;

use crate::util::clock::now_ms;
use crate::util::serde::{Priority, TaskId};

/// Queue slot for one task. The task record itself lives in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    /// Queued task.
    pub id: TaskId,
    /// Level the entry sits in.
    pub priority: Priority,
    /// When the entry was pushed (ms since epoch).
    pub enqueued_at_ms: u128,
}

struct Levels {
    levels: [VecDeque<QueueEntry>; 4],
    len: usize,
}

impl Levels {
    fn level_mut(&mut self, priority: Priority) -> &mut VecDeque<QueueEntry> {
        &mut self.levels[priority.slot()]
    }
}

/// Point-in-time queue figures.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    /// Entries across all levels.
    pub size: usize,
    /// Entries per level.
    pub by_priority: BTreeMap<Priority, usize>,
    /// Capacity enforced by `push`.
    pub max_size: usize,
    /// `size >= max_size`.
    pub is_full: bool,
    /// `size == 0`.
    pub is_empty: bool,
}

/// Bounded priority queue of task ids.
pub struct PriorityQueue {
    max_size: usize,
    inner: Mutex<Levels>,
}

impl PriorityQueue {
    /// Create a queue holding at most `max_size` entries.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            inner: Mutex::new(Levels {
                levels: Default::default(),
                len: 0,
            }),
        }
    }

    /// Append `id` to the back of its level. Returns false at capacity.
    pub fn push(&self, id: TaskId, priority: Priority) -> bool {
        let mut inner = self.inner.lock();
        if inner.len >= self.max_size {
            return false;
        }
        inner.level_mut(priority).push_back(QueueEntry {
            id,
            priority,
            enqueued_at_ms: now_ms(),
        });
        inner.len += 1;
        true
    }

    /// Append without the capacity check, for tasks that were already admitted.
    pub fn requeue(&self, id: TaskId, priority: Priority) {
        let mut inner = self.inner.lock();
        inner.level_mut(priority).push_back(QueueEntry {
            id,
            priority,
            enqueued_at_ms: now_ms(),
        });
        inner.len += 1;
    }

    /// Put a popped entry back at the head of its level.
    pub fn restore(&self, entry: QueueEntry) {
        let mut inner = self.inner.lock();
        inner.level_mut(entry.priority).push_front(entry);
        inner.len += 1;
    }

    /// Take the oldest entry of the most urgent non-empty level.
    pub fn pop(&self) -> Option<QueueEntry> {
        let mut inner = self.inner.lock();
        for priority in Priority::DESCENDING {
            if let Some(entry) = inner.level_mut(priority).pop_front() {
                inner.len -= 1;
                return Some(entry);
            }
        }
        None
    }

    /// Remove `id` wherever it sits. O(queue length).
    pub fn remove(&self, id: TaskId) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        for level in &mut inner.levels {
            if let Some(pos) = level.iter().position(|e| e.id == id) {
                level.remove(pos);
                inner.len -= 1;
                return true;
            }
        }
        false
    }

    /// Whether `id` is queued.
    pub fn contains(&self, id: TaskId) -> bool {
        let inner = self.inner.lock();
        inner.levels.iter().any(|level| level.iter().any(|e| e.id == id))
    }

    /// Entries across all levels.
    pub fn size(&self) -> usize {
        self.inner.lock().len
    }

    /// Entries per level, every level present.
    pub fn size_by_priority(&self) -> BTreeMap<Priority, usize> {
        let inner = self.inner.lock();
        Priority::DESCENDING
            .iter()
            .map(|p| (*p, inner.levels[p.slot()].len()))
            .collect()
    }

    /// Capacity enforced by `push`.
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// True when no entry is queued.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// True when `push` would be rejected.
    pub fn is_full(&self) -> bool {
        self.size() >= self.max_size
    }

    /// Drop every entry, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        for level in &mut inner.levels {
            level.clear();
        }
        std::mem::take(&mut inner.len)
    }

    /// Snapshot for statistics.
    pub fn status(&self) -> QueueStatus {
        let by_priority = self.size_by_priority();
        let size = by_priority.values().sum();
        QueueStatus {
            size,
            by_priority,
            max_size: self.max_size,
            is_full: size >= self.max_size,
            is_empty: size == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        let q = PriorityQueue::new(100);
        let (low, urgent, medium, high) = (TaskId::new(), TaskId::new(), TaskId::new(), TaskId::new());

        // Enqueue in mixed order
        assert!(q.push(low, Priority::Low));
        assert!(q.push(urgent, Priority::Urgent));
        assert!(q.push(medium, Priority::Medium));
        assert!(q.push(high, Priority::High));

        assert_eq!(q.pop().unwrap().id, urgent);
        assert_eq!(q.pop().unwrap().id, high);
        assert_eq!(q.pop().unwrap().id, medium);
        assert_eq!(q.pop().unwrap().id, low);
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_fifo_within_priority() {
        let q = PriorityQueue::new(100);
        let ids: Vec<_> = (0..5).map(|_| TaskId::new()).collect();
        for id in &ids {
            q.push(*id, Priority::Medium);
        }
        let popped: Vec<_> = std::iter::from_fn(|| q.pop().map(|e| e.id)).collect();
        assert_eq!(popped, ids);
    }

    #[test]
    fn test_queue_full() {
        let q = PriorityQueue::new(2);
        assert!(q.push(TaskId::new(), Priority::Medium));
        assert!(q.push(TaskId::new(), Priority::Medium));
        assert!(!q.push(TaskId::new(), Priority::Urgent));
        assert!(q.is_full());

        // Already-admitted retries bypass the cap.
        q.requeue(TaskId::new(), Priority::Low);
        assert_eq!(q.size(), 3);
    }

    #[test]
    fn test_remove() {
        let q = PriorityQueue::new(10);
        let a = TaskId::new();
        let b = TaskId::new();
        q.push(a, Priority::High);
        q.push(b, Priority::High);
        assert!(q.remove(a));
        assert!(!q.remove(a));
        assert!(!q.contains(a));
        assert_eq!(q.size(), 1);
        assert_eq!(q.pop().unwrap().id, b);
    }

    #[test]
    fn test_restore_goes_to_head() {
        let q = PriorityQueue::new(10);
        let first = TaskId::new();
        let second = TaskId::new();
        q.push(first, Priority::Low);
        q.push(second, Priority::Low);
        let entry = q.pop().unwrap();
        q.restore(entry);
        assert_eq!(q.pop().unwrap().id, first);
    }

    #[test]
    fn test_size_by_priority() {
        let q = PriorityQueue::new(10);
        q.push(TaskId::new(), Priority::Low);
        q.push(TaskId::new(), Priority::Low);
        q.push(TaskId::new(), Priority::Urgent);
        let sizes = q.size_by_priority();
        assert_eq!(sizes[&Priority::Low], 2);
        assert_eq!(sizes[&Priority::Urgent], 1);
        assert_eq!(sizes[&Priority::High], 0);
        assert_eq!(sizes.len(), 4);

        let status = q.status();
        assert_eq!(status.size, 3);
        assert!(!status.is_empty);
        assert_eq!(q.clear(), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn test_empty_queue() {
        let q = PriorityQueue::new(100);
        assert!(q.pop().is_none());
        assert_eq!(q.size(), 0);
    }
}
