//! Uploader port (driven/secondary port)
//!
//! The only contract with the network: hand over a request, get back one of
//! three outcomes. Transport errors are the adapter's to classify.

use std::time::Duration;

use crate::domain::request::PingRequest;

/// Outcome of one upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResult {
    /// The server accepted the ping
    Success { status: u16 },
    /// Network-level or server-side failure; retry later
    RecoverableFailure {
        /// Server-requested delay before the next attempt
        retry_after: Option<Duration>,
    },
    /// The server rejected the ping; never retry
    UnrecoverableFailure { status: u16 },
}

impl UploadResult {
    /// Classifies an HTTP status code
    ///
    /// 2xx succeeds, 429 and 5xx are retried, other 4xx are dropped.
    /// Anything else is treated as a transient failure.
    pub fn from_status(status: u16, retry_after: Option<Duration>) -> Self {
        match status {
            200..=299 => UploadResult::Success { status },
            429 | 500..=599 => UploadResult::RecoverableFailure { retry_after },
            400..=499 => UploadResult::UnrecoverableFailure { status },
            _ => UploadResult::RecoverableFailure { retry_after },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success { .. })
    }
}

/// Port for the external uploader
#[async_trait::async_trait]
pub trait IPingUploader: Send + Sync {
    /// Attempts a single upload; never panics, never retries internally
    async fn send(&self, request: &PingRequest) -> UploadResult;
}
