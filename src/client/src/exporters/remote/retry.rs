use super::error::SendResult;
use super::transport::Transport;
use arcu_common::types::ErrorRecord;
use std::time::{Duration, Instant};
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, warn};

/// Delays between attempts: `2^n` seconds for the n-th retry (1s, 2s, 4s, ...),
/// at most `max_retries` of them.
pub fn backoff_delays(max_retries: u32) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor(500)
        .take(max_retries as usize)
}

/// Posts `record`, retrying every failure until `max_retries` extra attempts
/// have been spent. Returns the last error once the budget is exhausted.
pub async fn send_with_retry(
    transport: &dyn Transport,
    endpoint: &str,
    record: &ErrorRecord,
    max_retries: u32,
) -> SendResult<()> {
    let total_attempts = max_retries + 1;
    let mut attempt = 0u32;

    Retry::spawn(backoff_delays(max_retries), || {
        attempt += 1;
        let attempt = attempt;

        async move {
            let start_time = Instant::now();
            let result = transport.post(endpoint, record).await;

            match &result {
                Ok(()) => debug!(
                    fingerprint = %record.fingerprint,
                    "Attempt {}/{} succeeded, elapsed: {:?}",
                    attempt,
                    total_attempts,
                    start_time.elapsed()
                ),
                Err(e) => warn!(
                    fingerprint = %record.fingerprint,
                    endpoint,
                    category = e.error_category().as_str(),
                    "Failed to send error record (attempt {}/{}): {}",
                    attempt,
                    total_attempts,
                    e
                ),
            }

            result
        }
    })
    .await
}
