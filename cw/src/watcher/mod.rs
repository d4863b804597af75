//! Watcher module for followed-comic monitoring
//!
//! The UpdateWatcher polls every followed comic and reports new pages
//! together with the users who follow them.

mod config;
mod update_watcher;

pub use config::WatcherConfig;
pub use update_watcher::UpdateWatcher;
