//! comicwatch - follow booru comics through a paced request scheduler
//!
//! Every call to the booru API, interactive or background, is queued on a
//! single [`Scheduler`]. The scheduler runs one request at a time, keeps
//! the outbound rate under the API's ceiling, retries failures, and hands
//! each caller its result through a one-shot promise.
//!
//! # Modules
//!
//! - [`scheduler`] - Priority queue, dispatch loop, promises
//! - [`transport`] - Transport trait and the reqwest implementation
//! - [`booru`] - Typed API calls and search ranking
//! - [`watcher`] - Polling followed comics for new pages
//! - [`domain`] - Requests and priorities
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod booru;
pub mod cli;
pub mod config;
pub mod domain;
pub mod scheduler;
pub mod transport;
pub mod watcher;

// Re-export commonly used types
pub use booru::{BooruClient, BooruError, ComicUpdate, Pool};
pub use config::{BooruConfig, Config, StorageConfig};
pub use domain::{Priority, Request, RequestId};
pub use scheduler::{
    BreakReason, PendingResponse, QueueState, RetryPolicy, Scheduler, SchedulerConfig, SchedulerError, SchedulerStats,
};
pub use transport::{HttpTransport, Transport, TransportError};
pub use watcher::{UpdateWatcher, WatcherConfig};
