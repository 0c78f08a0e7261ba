//! Backoff policy for KlingAI submissions.
//!
//! Only task submission is retried. Polling has its own fixed cadence and
//! downloads are attempted once.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Retry budget and backoff shape for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after an HTTP 429.
    pub rate_limit_retries: u32,
    /// Extra attempts after a connect/timeout failure or a gateway error.
    pub network_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_retries: 5,
            network_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first attempt.
    pub fn none() -> Self {
        Self {
            rate_limit_retries: 0,
            network_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// `base * 2^attempt` plus half a base (at most 500ms) of spread, capped at
    /// `backoff_max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self
            .backoff_base
            .saturating_mul(2u32.saturating_pow(attempt));
        let spread_ms = (self.backoff_base.as_millis() as u64).min(1000) / 2;
        exponential
            .saturating_add(Duration::from_millis(spread_ms))
            .min(self.backoff_max)
    }

    /// Delay after a rate-limited attempt; the server's `Retry-After` wins.
    pub fn rate_limit_delay(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        match retry_after_secs {
            Some(secs) => Duration::from_secs(secs).min(self.backoff_max),
            None => self.backoff(attempt),
        }
    }
}

/// Whether a transport failure is worth another attempt.
pub fn is_transient_network_error(error: &reqwest::Error) -> bool {
    if error.is_connect() || error.is_timeout() || error.is_body() {
        return true;
    }
    error.status().is_some_and(|s| is_gateway_status(s.as_u16()))
}

/// 502, 503 and 504 usually clear up on their own.
pub fn is_gateway_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

/// `Retry-After` in whole seconds, if present and numeric.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}
