//! Retry policy with exponential backoff and `Retry-After` support.
//!
//! Responses are classified as success, transient or permanent. Transient
//! failures are retried until the attempt budget runs out; permanent ones
//! surface on the first occurrence. Server-side per-endpoint limits (one
//! call per minute on some report endpoints, three calls per day on the
//! device download) are not enforced here.

use crate::config::RetryConfig;
use crate::errors::{ZscalerError, ZscalerErrorKind, ZscalerResult};
use crate::observability::TracingHooks;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Outcome class of a single HTTP attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 2xx.
    Success,
    /// Worth retrying: 408, 429, 500, 502, 503, 504, or a network failure.
    Transient,
    /// Every other non-2xx status.
    Permanent,
}

/// Classifies an HTTP status code.
pub fn classify_status(status: u16) -> Classification {
    match status {
        200..=299 => Classification::Success,
        408 | 429 | 500 | 502 | 503 | 504 => Classification::Transient,
        _ => Classification::Permanent,
    }
}

/// Classifies a failure raised before any response arrived.
pub fn classify_transport_error(error: &reqwest::Error) -> Classification {
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        Classification::Transient
    } else {
        Classification::Permanent
    }
}

/// Parses a `Retry-After` header in delta-seconds or HTTP-date form.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

/// A failed attempt, as reported to the retry loop.
#[derive(Debug)]
pub enum Failure {
    /// Another attempt may succeed.
    Transient {
        /// Error describing the attempt.
        error: ZscalerError,
        /// Server-requested delay.
        retry_after: Option<Duration>,
    },
    /// Surface immediately.
    Permanent(ZscalerError),
}

/// Exponential backoff retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Creates a policy from configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay, config.max_delay)
    }

    /// A policy making exactly one attempt.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Computed delay after the failed attempt with 0-based index `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before the next attempt; `Retry-After` replaces the computed value.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.backoff(attempt))
    }

    /// Runs `operation` until it succeeds, fails permanently, exhausts the
    /// budget, or `cancel` fires.
    pub async fn execute<F, Fut, T>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> ZscalerResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let mut attempt = 0u32;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ZscalerError::cancelled().with_attempt(attempt + 1));
                }
                outcome = operation(attempt) => outcome,
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(Failure::Permanent(error)) => return Err(error.with_attempt(attempt + 1)),
                Err(Failure::Transient { error, retry_after }) => {
                    if attempt + 1 >= self.max_attempts {
                        return Err(error
                            .into_kind(ZscalerErrorKind::TransientExhausted)
                            .with_attempt(attempt + 1));
                    }

                    let delay = self.delay_for(attempt, retry_after);
                    TracingHooks::on_retry(label, attempt + 1, delay, &error);

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(ZscalerError::cancelled().with_attempt(attempt + 1));
                        }
                        _ = sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}
