//! Scheduler error types

use thiserror::Error;

/// Why a promise ended in the broken state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakReason {
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("request cancelled before dispatch")]
    Cancelled,

    #[error("scheduler shut down")]
    Shutdown,

    #[error("promise dropped before resolution")]
    Dropped,
}

/// Errors surfaced by the scheduler and its queue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Dequeue found nothing; internal control flow only
    #[error("Queue is empty")]
    EmptyQueue,

    #[error("Promise already resolved")]
    AlreadyResolved,

    #[error("Dispatch loop already started")]
    AlreadyStarted,

    #[error("Invalid scheduler config: {0}")]
    InvalidConfig(String),

    #[error("Broken promise: {0}")]
    BrokenPromise(BreakReason),
}

impl SchedulerError {
    /// Check if this is a broken promise
    pub fn is_broken(&self) -> bool {
        matches!(self, SchedulerError::BrokenPromise(_))
    }

    /// Get the break reason if the promise was broken
    pub fn break_reason(&self) -> Option<&BreakReason> {
        match self {
            SchedulerError::BrokenPromise(reason) => Some(reason),
            _ => None,
        }
    }
}
