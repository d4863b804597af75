//! Outbound request description

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a submitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new time-ordered identifier
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to correlate log lines
        let full = self.0.simple().to_string();
        write!(f, "{}", &full[full.len() - 8..])
    }
}

/// One outbound GET against the downstream API
///
/// Immutable once constructed; the scheduler only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    id: RequestId,
    target: String,
}

impl Request {
    /// Create a request for the given URL
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            target: target.into(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The URL this request fetches
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}> {}", self.id, self.target)
    }
}
