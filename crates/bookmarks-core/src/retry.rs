//! ============================================================================
//! Retry Logic - Linear Backoff & Response Classification
//! ============================================================================
//! Policy for bookmark reads only (token endpoint calls are never retried):
//! - Network failures (including timeouts) and HTTP 429 are retried with
//!   linear backoff
//! - HTTP 401 is handed to the reauthentication decorator
//! - Any other non-2xx status fails immediately
//! ============================================================================

use std::time::Duration;

/// Configuration for upstream retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before retry n is n * backoff_step
    pub backoff_step: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(1),
        }
    }
}

/// How an upstream status should be treated by the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// 429, retry after backoff
    RateLimited,
    /// 401, surface to the reauthentication decorator
    Unauthorized,
    /// Other non-2xx, don't retry
    Permanent,
}

/// Classify an HTTP status for retry decisions
pub fn classify_status(status: u16) -> Outcome {
    match status {
        200..=299 => Outcome::Success,
        401 => Outcome::Unauthorized,
        429 => Outcome::RateLimited,
        _ => Outcome::Permanent,
    }
}

/// Delay inserted before the given retry (1-based: the first retry is 1)
pub fn backoff_delay(retry: u32, config: &RetryConfig) -> Duration {
    config.backoff_step.saturating_mul(retry)
}
