//! Domain types for comicwatch
//!
//! Requests and the priorities the scheduler orders them by.

mod priority;
mod request;

pub use priority::Priority;
pub use request::{Request, RequestId};
