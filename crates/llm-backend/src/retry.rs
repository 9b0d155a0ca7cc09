//! Bounded exponential-backoff retry for backend requests.
//!
//! Only 5xx, 408 and 429 responses plus timeouts and refused connections are
//! retried; every other failure propagates on the first attempt.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tracing::warn;

use crate::errors::{is_retryable_status, LlmError};

/// `base * 2^attempt`, saturating.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

pub async fn send_with_retry<F>(
    client: &Client,
    build_request: F,
    max_retries: u32,
    backoff_base: Duration,
    context: &str,
) -> Result<Response, LlmError>
where
    F: Fn(&Client) -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let failure = match build_request(client).send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                LlmError::Status { status, body }
            }
            Err(err) => LlmError::from(err),
        };

        if !failure.is_transient() || attempt >= max_retries {
            if failure.is_transient() {
                warn!(context, attempts = attempt + 1, error = %failure, "backend retries exhausted");
            }
            return Err(failure);
        }

        let delay = backoff_delay(backoff_base, attempt);
        match &failure {
            LlmError::Status { status, .. } if is_retryable_status(*status) => {
                warn!(context, status, delay_ms = delay.as_millis() as u64, "backend status, retrying");
            }
            other => {
                warn!(context, error = %other, delay_ms = delay.as_millis() as u64, "backend request failed, retrying");
            }
        }
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(250);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(250));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(2));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let delay = backoff_delay(Duration::from_secs(1), 64);
        assert!(delay >= Duration::from_secs(u32::MAX as u64));
    }

    #[tokio::test]
    async fn refused_connection_is_retried_then_reported() {
        let client = Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        let started = std::time::Instant::now();
        let err = send_with_retry(
            &client,
            |c| c.get("http://127.0.0.1:1/api/tags"),
            1,
            Duration::from_millis(20),
            "test",
        )
        .await
        .unwrap_err();
        assert!(err.is_transient(), "{err}");
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
