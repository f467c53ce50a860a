//! Retry loop shared by the HTTP providers.

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Delay before the first retry; doubled for each further attempt
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Non-2xx answer from a provider API
#[derive(Debug)]
pub struct ApiStatusError {
    pub provider: String,
    pub status: StatusCode,
    pub body: String,
}

impl fmt::Display for ApiStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} API error ({}): {}", self.provider, self.status, self.body)
    }
}

impl std::error::Error for ApiStatusError {}

impl ApiStatusError {
    /// Read the body of a failed response into an error
    pub async fn from_response(provider: &str, response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Self {
            provider: provider.to_string(),
            status,
            body,
        }
    }

    /// Client errors other than rate limiting will fail the same way again
    fn is_retryable(&self) -> bool {
        !(self.status.is_client_error() && self.status != StatusCode::TOO_MANY_REQUESTS)
    }
}

fn is_retryable(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiStatusError>()
        .map_or(true, ApiStatusError::is_retryable)
}

/// Run `op` up to `max_retries + 1` times with exponential backoff
pub async fn with_retries<T, F, Fut>(
    provider: &str,
    max_retries: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(base_delay, attempt)).await;
        }

        match op().await {
            Ok(response) => return Ok(response),
            Err(e) => {
                if !is_retryable(&e) {
                    tracing::warn!(provider = %provider, error = %e, "Request failed, not retrying");
                    return Err(e);
                }
                if attempt < max_retries {
                    tracing::warn!(
                        provider = %provider,
                        error = %e,
                        "Request failed (attempt {}/{}), retrying...",
                        attempt + 1,
                        max_retries + 1
                    );
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("All retry attempts failed")))
}

/// Exponential backoff before retry `attempt`: 1s, 2s, 4s for a 1s base
fn backoff_delay(base_delay: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base_delay.saturating_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn status_error(status: StatusCode) -> anyhow::Error {
        ApiStatusError {
            provider: "test".to_string(),
            status,
            body: "nope".to_string(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retries("test", 2, Duration::from_millis(1), move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(status_error(StatusCode::SERVICE_UNAVAILABLE))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retries("test", 1, Duration::from_millis(1), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("connection reset"))
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "connection reset");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retries("test", 3, Duration::from_millis(1), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(status_error(StatusCode::UNAUTHORIZED))
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("401"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let _: Result<()> = with_retries("test", 1, Duration::from_millis(1), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(status_error(StatusCode::TOO_MANY_REQUESTS))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        // 2^39 overflows u32; the delay must clamp instead of panicking
        assert_eq!(backoff_delay(base, 40), base * u32::MAX);
    }
}
