//! Priority levels for outbound requests

use serde::{Deserialize, Serialize};

/// Dispatch precedence for a queued request
///
/// Background maintenance work (update polling) ranks below interactive
/// work triggered by a user, so a search never waits behind a long update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Scheduled,
    User,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "user" => Ok(Self::User),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}
