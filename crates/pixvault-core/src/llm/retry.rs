//! Retry utilities for transient provider failures.
//!
//! Provides classification of retryable statuses, exponential backoff, and
//! the bounded retry loop every provider call goes through.

use std::time::Duration;

use tracing::{debug, warn};

use super::provider::{Completion, LlmProvider, LlmRequest};
use crate::config::AiConfig;
use crate::error::{PixvaultError, Result};

/// Whether an HTTP status is worth retrying.
///
/// Retryable: rate limits (429) and server errors (5xx). Everything else,
/// including auth failures and bad requests, fails immediately.
pub fn is_retryable(status_code: u16) -> bool {
    status_code == 429 || (500..=599).contains(&status_code)
}

/// Whether an HTTP status means the credential was refused.
pub fn is_auth_failure(status_code: u16) -> bool {
    matches!(status_code, 401 | 403)
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

/// Attempt budget and backoff base for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            retry_delay_ms: config.retry_delay_ms,
        }
    }

    /// Run `request` until it yields non-empty text.
    ///
    /// Rate limits and server errors are retried with backoff; a refused
    /// credential, any other status, and transport failures are returned
    /// as `Upstream` at once.
    pub async fn generate(&self, provider: &dyn LlmProvider, request: &LlmRequest) -> Result<String> {
        for attempt in 0..self.max_attempts {
            match provider.generate(request).await {
                Completion::Text(resp) => {
                    if resp.text.trim().is_empty() {
                        return Err(PixvaultError::upstream("provider returned empty text", None));
                    }
                    debug!(
                        model = %resp.model,
                        tokens = ?resp.tokens_used,
                        latency_ms = resp.latency_ms,
                        "Provider reply received"
                    );
                    return Ok(resp.text);
                }
                Completion::Error {
                    status_code: Some(code),
                    ..
                } if is_auth_failure(code) => {
                    return Err(PixvaultError::upstream("credential rejected", Some(code)));
                }
                Completion::Error {
                    status_code: Some(code),
                    message,
                } if is_retryable(code) && attempt + 1 < self.max_attempts => {
                    let delay = backoff_duration(attempt, self.retry_delay_ms);
                    warn!(
                        provider = provider.name(),
                        attempt = attempt + 1,
                        status = code,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {message}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Completion::Error {
                    status_code,
                    message,
                } => return Err(PixvaultError::upstream(message, status_code)),
            }
        }
        Err(PixvaultError::upstream("provider retries exhausted", None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retryable() {
        assert!(is_retryable(429));
    }

    #[test]
    fn test_server_error_is_retryable() {
        assert!(is_retryable(500));
        assert!(is_retryable(503));
    }

    #[test]
    fn test_client_errors_not_retryable() {
        assert!(!is_retryable(400));
        assert!(!is_retryable(401));
        assert!(!is_retryable(404));
        assert!(is_auth_failure(403));
        assert!(!is_auth_failure(429));
    }

    #[test]
    fn test_backoff_exponential() {
        assert_eq!(backoff_duration(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(1, 1000), Duration::from_millis(2000));
        assert_eq!(backoff_duration(2, 1000), Duration::from_millis(4000));
        assert_eq!(backoff_duration(3, 1000), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_capped_at_30s() {
        assert_eq!(backoff_duration(10, 1000), Duration::from_millis(30_000));
    }

    #[test]
    fn test_policy_has_at_least_one_attempt() {
        let config = AiConfig {
            max_retries: 0,
            retry_delay_ms: 5,
            ..AiConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.retry_delay_ms, 5);
    }
}
