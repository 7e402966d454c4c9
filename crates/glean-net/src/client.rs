//! reqwest-backed uploader
//!
//! ## Usage
//!
//! ```rust,no_run
//! use glean_net::HttpUploader;
//! use std::time::Duration;
//!
//! # fn example() -> anyhow::Result<()> {
//! let uploader = HttpUploader::new("https://incoming.telemetry.mozilla.org", Duration::from_secs(30))?;
//! // Hand `uploader` to `Glean::initialize`...
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use tracing::{debug, warn};

use glean_core::domain::request::PingRequest;
use glean_core::ports::{IPingUploader, UploadResult};

use crate::retry_after::parse_retry_after;

/// Uploads pings with HTTP POST to `{server_endpoint}{request.path}`
pub struct HttpUploader {
    client: Client,
    server_endpoint: String,
}

impl HttpUploader {
    /// Creates an uploader for the given collection endpoint
    ///
    /// # Arguments
    /// * `server_endpoint` - Base URL, without the submission path
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    /// Fails if the underlying TLS backend cannot be initialized.
    pub fn new(server_endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            server_endpoint: server_endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// Full URL for a request
    pub fn url_for(&self, request: &PingRequest) -> String {
        format!("{}{}", self.server_endpoint, request.path)
    }
}

#[async_trait::async_trait]
impl IPingUploader for HttpUploader {
    async fn send(&self, request: &PingRequest) -> UploadResult {
        let url = self.url_for(request);

        let mut builder = self.client.post(&url).body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);

                debug!(
                    document_id = %request.document_id,
                    ping = %request.ping_name,
                    status,
                    "Ping upload finished"
                );
                UploadResult::from_status(status, retry_after)
            }
            Err(e) => {
                warn!(
                    document_id = %request.document_id,
                    ping = %request.ping_name,
                    error = %e,
                    "Ping upload failed at the transport level"
                );
                UploadResult::RecoverableFailure { retry_after: None }
            }
        }
    }
}
