//! Delivery of error records to a custom HTTP endpoint.
//!
//! Every record is POSTed as one JSON object. Failed deliveries are retried
//! with exponential backoff and dropped once the retry budget is spent.

mod error;
mod retry;
mod transport;

pub use error::{ErrorCategory, SendError, SendResult};
pub use retry::{backoff_delays, send_with_retry};
pub use transport::{HttpTransport, Transport};

#[cfg(test)]
pub use transport::MockTransport;

use crate::exporters::sink::Sink;
use arcu_common::types::ErrorRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Sink posting records to the configured remote endpoint.
pub struct RemoteSink {
    endpoint: String,
    transport: Arc<dyn Transport>,
    max_retries: u32,
    console_logging: bool,
}

impl RemoteSink {
    pub fn new(
        endpoint: impl Into<String>,
        transport: Arc<dyn Transport>,
        max_retries: u32,
        console_logging: bool,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
            max_retries,
            console_logging,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Sink for RemoteSink {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn deliver(&self, record: &ErrorRecord) -> SendResult<()> {
        let start_time = Instant::now();

        send_with_retry(
            self.transport.as_ref(),
            &self.endpoint,
            record,
            self.max_retries,
        )
        .await?;

        if self.console_logging {
            info!(
                fingerprint = %record.fingerprint,
                "Error sent to {} in {:?}",
                self.endpoint,
                start_time.elapsed()
            );
        }
        Ok(())
    }
}
