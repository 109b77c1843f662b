//! Shared retry policy for every provider client.
//!
//! Retryable failures (timeouts, connection resets, HTTP 429 and 5xx) are
//! retried with exponential backoff starting at one second. Everything else,
//! and the last failure after retries run out, leaves through [`normalize`].

use crate::llm::types::{ErrorKind, LLMError};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

const BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the next attempt, given how many retries are still left.
    ///
    /// `2^(max_retries - remaining)` seconds: 1s, 2s, 4s, ... with no cap.
    pub fn backoff_delay(&self, remaining: u32) -> Duration {
        let exponent = self.max_retries.saturating_sub(remaining);
        2u32.checked_pow(exponent)
            .and_then(|factor| BASE_DELAY.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// exhausts the retry budget. Makes at most `max_retries + 1` attempts.
    pub async fn execute<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, LLMError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LLMError>>,
    {
        let mut remaining = self.max_retries;
        let mut attempt = 1u32;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation_name, attempt);
                    }
                    return Ok(value);
                }
                Err(error) if error.is_retryable() && remaining > 0 => {
                    let delay = self.backoff_delay(remaining);
                    warn!(
                        provider = %error.provider,
                        code = %error.code,
                        "{} failed on attempt {} ({}), retrying in {:?}",
                        operation_name,
                        attempt,
                        error.message,
                        delay
                    );
                    remaining -= 1;
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    if error.is_retryable() {
                        warn!(
                            provider = %error.provider,
                            "{} gave up after {} attempts",
                            operation_name,
                            attempt
                        );
                    }
                    return Err(normalize(error));
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::llm::types::DEFAULT_MAX_RETRIES)
    }
}

/// Replace transport messages with the standard wording for well-known HTTP
/// statuses. Other messages pass through untouched.
pub fn normalize(mut error: LLMError) -> LLMError {
    match error.http_status {
        Some(401) => {
            error.kind = ErrorKind::Authentication;
            error.message = "Invalid API key".to_string();
        }
        Some(429) => {
            error.kind = ErrorKind::RateLimited;
            error.message = "Rate limit exceeded, please try again later".to_string();
        }
        Some(status) if status >= 500 => {
            error.kind = ErrorKind::ServerError;
            error.message = format!("Provider server error (HTTP {})", status);
        }
        _ => {}
    }
    error
}
