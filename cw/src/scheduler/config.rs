//! Scheduler configuration

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Slowest accepted rate: one request every 1000 seconds
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.001;

/// Where a failed attempt goes before its next try
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryPolicy {
    /// Retry the same item right after pacing; it keeps the dispatch slot
    #[default]
    InPlace,

    /// Re-insert the item at the tail of its priority tier
    Requeue,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Rate ceiling imposed by the downstream API
    #[serde(rename = "requests-per-second", default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Added to the pacing interval to stay clear of the ceiling
    #[serde(rename = "safety-margin-ms", default = "default_safety_margin_ms")]
    pub safety_margin_ms: u64,

    /// Attempts per request before its promise is broken
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base for exponential backoff added after a failed attempt
    #[serde(rename = "retry-backoff-ms", default)]
    pub retry_backoff_ms: u64,

    #[serde(rename = "retry-policy", default)]
    pub retry_policy: RetryPolicy,
}

fn default_requests_per_second() -> f64 {
    2.0
}

fn default_safety_margin_ms() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            safety_margin_ms: default_safety_margin_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: 0,
            retry_policy: RetryPolicy::InPlace,
        }
    }
}

impl SchedulerConfig {
    /// Mandatory delay after every attempt
    ///
    /// Saturates for rates [`validate`](Self::validate) rejects; the
    /// scheduler refuses to start with those.
    pub fn pacing_interval(&self) -> Duration {
        self.try_pacing_interval().unwrap_or(Duration::MAX)
    }

    /// Mandatory delay after every attempt, or why it cannot be represented
    pub fn try_pacing_interval(&self) -> Result<Duration> {
        let base = Duration::try_from_secs_f64(1.0 / self.requests_per_second)
            .map_err(|e| eyre!("requests-per-second {} gives no usable interval: {}", self.requests_per_second, e))?;
        base.checked_add(Duration::from_millis(self.safety_margin_ms))
            .ok_or_else(|| eyre!("pacing interval overflows with safety-margin-ms {}", self.safety_margin_ms))
    }

    /// Extra delay after the given failed attempt (1-based)
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        if self.retry_backoff_ms == 0 || attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u64.saturating_pow(attempt - 1);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }

    /// Reject settings the dispatch loop cannot honor
    pub fn validate(&self) -> Result<()> {
        if !self.requests_per_second.is_finite() || self.requests_per_second < MIN_REQUESTS_PER_SECOND {
            return Err(eyre!(
                "requests-per-second must be a number of at least {}, got {}",
                MIN_REQUESTS_PER_SECOND,
                self.requests_per_second
            ));
        }
        self.try_pacing_interval()?;
        if self.max_attempts == 0 {
            return Err(eyre!("max-attempts must be at least 1"));
        }
        Ok(())
    }
}
