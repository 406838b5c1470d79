//! One ordered queue per `group_id`, with a single global dequeue that
//! always returns the best `(priority desc, seq asc)` candidate across every
//! group. Ties within a priority band are FIFO by insertion order, regardless
//! of which group they came from.

use engine_core::models::{GroupId, TaskId};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Eq, PartialEq)]
struct QueueEntry {
    priority: i32,
    seq: u64,
    task_id: TaskId,
}

impl Ord for QueueEntry {
    /// `BinaryHeap` is a max-heap, so "greater" must mean "dequeue me first":
    /// higher priority wins, and for equal priority the lower `seq` wins
    /// (hence the reversed comparison on `seq`).
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    groups: HashMap<GroupId, BinaryHeap<QueueEntry>>,
    tombstones: HashSet<TaskId>,
}

/// Priority queue with one `BinaryHeap` lane per group, fed by a single
/// `Notify` so the dequeuer only wakes when there's a chance of work.
pub struct TaskQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    next_seq: AtomicU64,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { groups: HashMap::new(), tombstones: HashSet::new() }),
            notify: Notify::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Enqueue `task_id` into `group_id`'s lane at `priority`.
    pub fn enqueue(&self, task_id: TaskId, group_id: GroupId, priority: i32) {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        let mut inner = self.inner.lock().unwrap();
        inner.groups.entry(group_id).or_default().push(QueueEntry { priority, seq, task_id });
        drop(inner);
        self.notify.notify_one();
    }

    /// Mark `task_id` cancelled. A tombstoned id is silently dropped the
    /// next time it would otherwise be dequeued.
    pub fn try_cancel(&self, task_id: TaskId) {
        let mut inner = self.inner.lock().unwrap();
        inner.tombstones.insert(task_id);
    }

    /// Dequeue the globally best `(task_id, group_id)`, blocking until one is
    /// available or `shutdown` fires. Returns `None` only on shutdown.
    pub async fn dequeue(&self, shutdown: &CancellationToken) -> Option<(TaskId, GroupId)> {
        loop {
            if let Some(found) = self.try_dequeue_once() {
                return Some(found);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = shutdown.cancelled() => return None,
            }
        }
    }

    /// Non-blocking dequeue attempt; used by tests and by `dequeue`'s inner loop.
    pub fn try_dequeue_once(&self) -> Option<(TaskId, GroupId)> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            let best_group = inner
                .groups
                .iter()
                .filter(|(_, heap)| !heap.is_empty())
                .max_by(|(_, a), (_, b)| a.peek().unwrap().cmp(b.peek().unwrap()))
                .map(|(group_id, _)| group_id.clone());

            let group_id = best_group?;
            let entry = {
                let heap = inner.groups.get_mut(&group_id).unwrap();
                heap.pop().expect("group selected because its heap was non-empty")
            };

            if inner.tombstones.remove(&entry.task_id) {
                continue;
            }
            return Some((entry.task_id, group_id));
        }
    }

    /// Wake every waiting dequeuer without enqueuing anything; used on shutdown.
    pub fn notify_all(&self) {
        self.notify.notify_waiters();
    }
}
