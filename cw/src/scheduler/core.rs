//! Scheduler facade

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::SchedulerConfig;
use super::dispatch::{DispatchLoop, DispatchState, SchedulerStats, SharedStatus, lock_status};
use super::error::{BreakReason, SchedulerError};
use super::promise::{PendingResponse, promise};
use super::queue::{QueueEntry, QueuedItem, RequestQueue};
use crate::domain::{Priority, Request, RequestId};
use crate::transport::Transport;

/// Snapshot of the scheduler for display
#[derive(Debug, Clone)]
pub struct QueueState {
    pub state: DispatchState,
    pub queued: usize,
    pub stats: SchedulerStats,
}

/// The Scheduler serializes every outbound request onto one
/// rate-limited, single-flight channel to the downstream API.
///
/// Callers submit from anywhere; one dispatch loop, started with
/// [`Scheduler::start`], executes requests in priority order and resolves
/// each caller's promise exactly once.
pub struct Scheduler {
    config: SchedulerConfig,
    queue: Arc<RequestQueue>,
    transport: Arc<dyn Transport>,
    status: SharedStatus,
    started: AtomicBool,
}

impl Scheduler {
    /// Create a new scheduler over the given transport
    pub fn new(config: SchedulerConfig, transport: Arc<dyn Transport>) -> Self {
        debug!(?config, "Scheduler::new: called");
        Self {
            config,
            queue: Arc::new(RequestQueue::new()),
            transport,
            status: SharedStatus::default(),
            started: AtomicBool::new(false),
        }
    }

    /// Spawn the dispatch loop onto the current tokio runtime
    ///
    /// Only one loop may ever run per scheduler; a second loop would
    /// double the dispatch rate.
    ///
    /// A config the loop cannot honor is rejected with
    /// [`SchedulerError::InvalidConfig`] and the scheduler is shut down, so
    /// queued and later submissions are broken instead of left waiting.
    pub fn start(&self) -> Result<JoinHandle<()>, SchedulerError> {
        debug!("Scheduler::start: called");
        if let Err(e) = self.config.validate() {
            error!(error = %e, "Refusing to start dispatch loop");
            self.shutdown();
            return Err(SchedulerError::InvalidConfig(e.to_string()));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Scheduler::start: already started, rejecting");
            return Err(SchedulerError::AlreadyStarted);
        }

        let dispatch = DispatchLoop::new(
            self.config.clone(),
            self.queue.clone(),
            self.transport.clone(),
            self.status.clone(),
        );
        Ok(tokio::spawn(dispatch.run()))
    }

    /// Enqueue a request and return its pending response immediately
    pub fn submit(&self, request: Request, priority: Priority) -> PendingResponse<Value> {
        debug!(%request, %priority, "Scheduler::submit: called");
        let (promise, pending) = promise(request.id());
        let item = QueuedItem::new(request, priority, promise);

        lock_status(&self.status).stats.total_submitted += 1;

        match self.queue.push(item) {
            Ok(depth) => {
                debug!(request_id = %pending.request_id(), %priority, depth, "Enqueued request");
            }
            Err(mut item) => {
                warn!(request = %item.request, "Scheduler is shut down; rejecting request");
                lock_status(&self.status).stats.total_shutdown += 1;
                item.break_with(BreakReason::Shutdown);
            }
        }
        pending
    }

    /// Enqueue a request and wait for its result
    pub async fn submit_and_wait(&self, request: Request, priority: Priority) -> Result<Value, SchedulerError> {
        debug!(%request, %priority, "Scheduler::submit_and_wait: called");
        self.submit(request, priority).wait().await
    }

    /// GET `target` through the queue and wait for the parsed body
    pub async fn fetch(&self, target: impl Into<String>, priority: Priority) -> Result<Value, SchedulerError> {
        self.submit_and_wait(Request::get(target), priority).await
    }

    /// Withdraw a request that has not started executing
    ///
    /// The caller's promise is broken with [`BreakReason::Cancelled`].
    /// Returns false if the request is in flight, finished, or unknown.
    pub fn cancel(&self, request_id: RequestId) -> bool {
        debug!(%request_id, "Scheduler::cancel: called");
        let Some(mut item) = self.queue.remove(request_id) else {
            debug!(%request_id, "Scheduler::cancel: not queued");
            return false;
        };

        lock_status(&self.status).stats.total_cancelled += 1;
        item.break_with(BreakReason::Cancelled);
        info!(request = %item.request, "Cancelled request");
        true
    }

    /// Stop accepting work and break every queued promise
    ///
    /// An attempt already in flight completes; the loop then exits.
    /// Returns how many queued requests were broken.
    pub fn shutdown(&self) -> usize {
        debug!("Scheduler::shutdown: called");
        let drained = self.queue.close();
        let count = drained.len();

        lock_status(&self.status).stats.total_shutdown += count as u64;
        for mut item in drained {
            item.break_with(BreakReason::Shutdown);
        }

        if !self.started.load(Ordering::SeqCst) {
            lock_status(&self.status).state = DispatchState::Stopped;
        }
        info!(dropped = count, "Scheduler shut down");
        count
    }

    /// Current dispatch state and counters
    pub fn queue_state(&self) -> QueueState {
        let status = lock_status(&self.status);
        let mut stats = status.stats.clone();
        stats.peak_queue_depth = self.queue.peak_depth();
        QueueState {
            state: status.state,
            queued: self.queue.len(),
            stats,
        }
    }

    /// Pending requests in the order they will be dispatched
    pub fn queue_details(&self) -> Vec<QueueEntry> {
        self.queue.entries()
    }

    /// Get the scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        self.queue_state().stats
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}
