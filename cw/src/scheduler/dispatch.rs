//! Single-flight dispatch loop

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use super::config::{RetryPolicy, SchedulerConfig};
use super::error::BreakReason;
use super::queue::{QueuedItem, RequestQueue};
use crate::transport::Transport;

/// What the dispatch loop is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    /// Waiting for the queue to become non-empty
    #[default]
    Idle,
    /// One attempt in flight against the transport
    Executing,
    /// Mandatory delay after an attempt
    Pacing,
    /// Loop has exited after shutdown
    Stopped,
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Executing => write!(f, "executing"),
            Self::Pacing => write!(f, "pacing"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub total_submitted: u64,
    pub total_fulfilled: u64,
    /// Promises broken because every attempt failed
    pub total_failed: u64,
    pub total_cancelled: u64,
    /// Skipped because the caller stopped waiting
    pub total_abandoned: u64,
    /// Broken by shutdown while still queued
    pub total_shutdown: u64,
    pub total_attempts: u64,
    pub total_retries: u64,
    pub peak_queue_depth: usize,
}

/// State and counters shared between the loop and the facade
#[derive(Debug, Default)]
pub(crate) struct DispatchStatus {
    pub state: DispatchState,
    pub stats: SchedulerStats,
}

pub(crate) type SharedStatus = Arc<Mutex<DispatchStatus>>;

pub(crate) fn lock_status(status: &SharedStatus) -> MutexGuard<'_, DispatchStatus> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of one dispatch of an item
enum Disposition {
    Done,
    RetryInPlace(QueuedItem),
    Requeue(QueuedItem),
}

pub(crate) struct DispatchLoop {
    config: SchedulerConfig,
    queue: Arc<RequestQueue>,
    transport: Arc<dyn Transport>,
    status: SharedStatus,
}

impl DispatchLoop {
    pub fn new(
        config: SchedulerConfig,
        queue: Arc<RequestQueue>,
        transport: Arc<dyn Transport>,
        status: SharedStatus,
    ) -> Self {
        Self {
            config,
            queue,
            transport,
            status,
        }
    }

    /// Drain the queue until it is closed
    pub async fn run(self) {
        info!(
            pacing_ms = self.config.pacing_interval().as_millis() as u64,
            max_attempts = self.config.max_attempts,
            retry_policy = ?self.config.retry_policy,
            "Dispatch loop started"
        );

        while let Some(item) = self.queue.next().await {
            let mut next = Some(item);
            while let Some(item) = next.take() {
                next = match self.attempt(item).await {
                    Disposition::Done => None,
                    Disposition::RetryInPlace(item) => Some(item),
                    Disposition::Requeue(item) => {
                        if let Err(mut item) = self.queue.push(item) {
                            self.break_item(&mut item, BreakReason::Shutdown);
                        }
                        None
                    }
                };
            }
            self.set_state(DispatchState::Idle);
        }

        self.set_state(DispatchState::Stopped);
        info!("Dispatch loop stopped");
    }

    /// Run one attempt of an item, resolve or route it, then pace
    async fn attempt(&self, mut item: QueuedItem) -> Disposition {
        if item.promise.is_resolved() {
            error!(request = %item.request, "DispatchLoop::attempt: promise already resolved, dropping");
            return Disposition::Done;
        }
        if item.promise.is_abandoned() {
            debug!(request = %item.request, "DispatchLoop::attempt: caller gone, skipping");
            lock_status(&self.status).stats.total_abandoned += 1;
            return Disposition::Done;
        }
        if item.attempt > 0 && self.queue.is_closed() {
            debug!(request = %item.request, "DispatchLoop::attempt: shut down between retries");
            self.break_item(&mut item, BreakReason::Shutdown);
            return Disposition::Done;
        }

        item.attempt += 1;
        let attempt = item.attempt;
        {
            let mut status = lock_status(&self.status);
            status.state = DispatchState::Executing;
            status.stats.total_attempts += 1;
        }
        info!(request = %item.request, priority = %item.priority, attempt, "Requesting");

        let result = self.transport.execute(&item.request).await;

        match result {
            Ok(value) => {
                debug!(request = %item.request, attempt, "DispatchLoop::attempt: success");
                if let Err(e) = item.promise.fulfill(value) {
                    error!(request = %item.request, error = %e, "Could not fulfill promise");
                }
                lock_status(&self.status).stats.total_fulfilled += 1;
                self.pace(None).await;
                Disposition::Done
            }
            Err(e) if attempt < self.config.max_attempts => {
                let delay = self.config.pacing_interval().saturating_add(self.config.retry_backoff(attempt));
                warn!(
                    request = %item.request,
                    attempt,
                    error = %e,
                    status = ?e.status(),
                    malformed = e.is_malformed(),
                    retry_in_ms = delay.as_millis() as u64,
                    "Fetch attempt failed; retrying"
                );
                lock_status(&self.status).stats.total_retries += 1;
                self.pace(Some(attempt)).await;
                match self.config.retry_policy {
                    RetryPolicy::InPlace => Disposition::RetryInPlace(item),
                    RetryPolicy::Requeue => Disposition::Requeue(item),
                }
            }
            Err(e) => {
                error!(
                    request = %item.request,
                    attempt,
                    error = %e,
                    status = ?e.status(),
                    malformed = e.is_malformed(),
                    "Fetch failed; giving up"
                );
                self.break_item(
                    &mut item,
                    BreakReason::RetriesExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    },
                );
                self.pace(None).await;
                Disposition::Done
            }
        }
    }

    /// Wait out the rate ceiling, plus backoff after a failed attempt
    async fn pace(&self, failed_attempt: Option<u32>) {
        self.set_state(DispatchState::Pacing);
        let mut delay = self.config.pacing_interval();
        if let Some(attempt) = failed_attempt {
            delay = delay.saturating_add(self.config.retry_backoff(attempt));
        }
        tokio::time::sleep(delay).await;
    }

    fn break_item(&self, item: &mut QueuedItem, reason: BreakReason) {
        let mut status = lock_status(&self.status);
        match reason {
            BreakReason::Shutdown => status.stats.total_shutdown += 1,
            BreakReason::Cancelled => status.stats.total_cancelled += 1,
            _ => status.stats.total_failed += 1,
        }
        drop(status);

        item.break_with(reason);
    }

    fn set_state(&self, state: DispatchState) {
        lock_status(&self.status).state = state;
    }
}
