//! Priority queue of pending requests

use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error};

use super::error::{BreakReason, SchedulerError};
use super::promise::Promise;
use crate::domain::{Priority, Request, RequestId};

/// A request waiting for (or between) dispatch attempts
#[derive(Debug)]
pub struct QueuedItem {
    pub request: Request,
    pub priority: Priority,
    /// Enqueue order, assigned by the queue on every push
    pub sequence: u64,
    /// Attempts already made
    pub attempt: u32,
    pub submitted_at: Instant,
    pub promise: Promise<Value>,
}

impl QueuedItem {
    pub fn new(request: Request, priority: Priority, promise: Promise<Value>) -> Self {
        Self {
            request,
            priority,
            sequence: 0,
            attempt: 0,
            submitted_at: Instant::now(),
            promise,
        }
    }

    /// Break the caller's promise; a promise that was already resolved is logged
    pub fn break_with(&mut self, reason: BreakReason) {
        if let Err(e) = self.promise.break_promise(reason) {
            error!(request = %self.request, error = %e, "Could not break promise");
        }
    }
}

impl Eq for QueuedItem {}

impl PartialEq for QueuedItem {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Ord for QueuedItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher priority first, then earlier enqueue
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Queue entry for display
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub request_id: RequestId,
    pub target: String,
    pub priority: Priority,
    pub attempt: u32,
    pub wait_time: Duration,
}

struct QueueInner {
    heap: BinaryHeap<QueuedItem>,
    next_sequence: u64,
    peak_depth: usize,
    closed: bool,
}

/// Mutex-guarded heap shared by submitters and the dispatch loop
pub struct RequestQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_sequence: 0,
                peak_depth: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert an item behind everything of equal priority
    ///
    /// Returns the new depth, or hands the item back if the queue is closed.
    pub fn push(&self, mut item: QueuedItem) -> Result<usize, QueuedItem> {
        let mut inner = self.lock();
        if inner.closed {
            debug!(request = %item.request, "RequestQueue::push: queue closed, rejecting");
            return Err(item);
        }

        item.sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.heap.push(item);

        let depth = inner.heap.len();
        inner.peak_depth = inner.peak_depth.max(depth);
        drop(inner);

        self.notify.notify_one();
        Ok(depth)
    }

    /// Remove the highest-priority, earliest-enqueued item
    pub fn pop_highest(&self) -> Result<QueuedItem, SchedulerError> {
        self.lock().heap.pop().ok_or(SchedulerError::EmptyQueue)
    }

    /// Wait for the next item; `None` once the queue is closed
    ///
    /// Intended for a single consumer: wakeups are delivered with
    /// `notify_one`, which stores a permit if nobody is waiting yet.
    pub async fn next(&self) -> Option<QueuedItem> {
        loop {
            if self.is_closed() {
                debug!("RequestQueue::next: closed");
                return None;
            }
            match self.pop_highest() {
                Ok(item) => return Some(item),
                Err(SchedulerError::EmptyQueue) => {
                    debug!("RequestQueue::next: empty, waiting for push");
                    self.notify.notified().await;
                }
                Err(e) => {
                    debug!(error = %e, "RequestQueue::next: unexpected dequeue error");
                    return None;
                }
            }
        }
    }

    /// Eagerly remove a pending item by request id
    pub fn remove(&self, request_id: RequestId) -> Option<QueuedItem> {
        let mut inner = self.lock();
        let mut items = std::mem::take(&mut inner.heap).into_vec();
        let removed = items
            .iter()
            .position(|item| item.request.id() == request_id)
            .map(|index| items.swap_remove(index));
        inner.heap = BinaryHeap::from(items);
        removed
    }

    /// Refuse further pushes and hand back everything still pending
    pub fn close(&self) -> Vec<QueuedItem> {
        let mut inner = self.lock();
        inner.closed = true;
        let drained = std::mem::take(&mut inner.heap).into_sorted_vec();
        drop(inner);

        // Wake the consumer so it can observe the close
        self.notify.notify_one();
        drained.into_iter().rev().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    /// Deepest the queue has been
    pub fn peak_depth(&self) -> usize {
        self.lock().peak_depth
    }

    /// Pending entries in dispatch order
    pub fn entries(&self) -> Vec<QueueEntry> {
        let inner = self.lock();
        let now = Instant::now();
        let mut ordered: Vec<&QueuedItem> = inner.heap.iter().collect();
        ordered.sort_by(|a, b| b.cmp(a));
        ordered
            .into_iter()
            .map(|item| QueueEntry {
                request_id: item.request.id(),
                target: item.request.target().to_string(),
                priority: item.priority,
                attempt: item.attempt,
                wait_time: now - item.submitted_at,
            })
            .collect()
    }
}
