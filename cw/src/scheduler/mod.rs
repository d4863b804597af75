//! Outbound request scheduler
//!
//! Accepts fetches from any number of callers, executes them one at a time
//! in priority order against the transport, retries failures a bounded
//! number of times, paces attempts under the downstream rate ceiling and
//! resolves each caller's promise exactly once.

mod config;
mod core;
mod dispatch;
mod error;
mod promise;
mod queue;

pub use config::{MIN_REQUESTS_PER_SECOND, RetryPolicy, SchedulerConfig};
pub use core::{QueueState, Scheduler};
pub use dispatch::{DispatchState, SchedulerStats};
pub use error::{BreakReason, SchedulerError};
pub use promise::{PendingResponse, Promise, promise};
pub use queue::{QueueEntry, QueuedItem, RequestQueue};
