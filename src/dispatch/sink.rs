//! # Time-Series Sink
//!
//! Trait abstraction for batch delivery, and the InfluxDB v2 HTTP adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::InfluxConfig;
use crate::error::{RelayError, Result};

/// Destination for newline-joined batches of encoded lines.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver one batch payload.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Transport` if the endpoint is unreachable or
    /// answers with anything but success.
    async fn send(&self, payload: &str) -> Result<()>;
}

/// InfluxDB v2 `/api/v2/write` endpoint with millisecond precision.
///
/// Success is HTTP 204 (No Content); every other status is a transport error.
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: Client,
    url: String,
    org: String,
    bucket: String,
    token: String,
}

impl InfluxSink {
    /// Build the sink and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RelayError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: write_url(config),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
        })
    }

    /// Write endpoint URL, without query parameters.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Base write URL for the configured host.
pub fn write_url(config: &InfluxConfig) -> String {
    let scheme = if config.use_tls { "https" } else { "http" };
    format!("{}://{}:{}/api/v2/write", scheme, config.host, config.port)
}

#[async_trait]
impl Sink for InfluxSink {
    async fn send(&self, payload: &str) -> Result<()> {
        let mut request = self
            .client
            .post(&self.url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ms"),
            ])
            .body(payload.to_owned());

        if !self.token.is_empty() {
            request = request.header(AUTHORIZATION, format!("Token {}", self.token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("POST {} failed: {}", self.url, e)))?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Transport(format!(
                "unexpected status {} from {}: {}",
                status, self.url, body
            )));
        }

        debug!("Wrote {} bytes to {}", payload.len(), self.url);
        Ok(())
    }
}
