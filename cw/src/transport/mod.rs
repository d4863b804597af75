//! Transport boundary between the scheduler and the downstream API
//!
//! The scheduler never talks HTTP itself; it calls through [`Transport`].

use async_trait::async_trait;
use serde_json::Value;

mod error;
mod http;

pub use error::TransportError;
pub use http::HttpTransport;

use crate::domain::Request;

/// Executes one outbound request and returns its parsed JSON body
///
/// Implementations hold any session state (client, credentials) created
/// once up front. Transport and parse failures are both reported as
/// [`TransportError`]; the scheduler retries them identically.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &Request) -> Result<Value, TransportError>;
}
