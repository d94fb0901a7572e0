use super::error::{SendError, SendResult};
use anyhow::{Context, Result};
use arcu_common::types::ErrorRecord;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// Posts one JSON-encoded record to a URL.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, record: &ErrorRecord) -> SendResult<()>;
}

/// HTTP transport built on a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, record: &ErrorRecord) -> SendResult<()> {
        let response = self.client.post(url).json(record).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(SendError::server_error(status, body))
        }
    }
}
