//! Upload management
//!
//! Assembled pings are persisted in the pending queue and uploaded by one
//! background worker in queue order. A ping is never skipped: the worker
//! keeps retrying the head of the queue until it succeeds or is dropped.
//!
//! ## Retry policy
//!
//! - `Success`: removed from the queue
//! - `UnrecoverableFailure`: removed immediately and counted
//! - `RecoverableFailure`: retried with exponential backoff
//!   (`base * 2^(n-1)`, capped), raised to the server's `Retry-After`.
//!   After `max_recoverable_failures` attempts the ping is dropped and counted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use glean_core::config::UploadConfig;
use glean_core::domain::request::{date_header_value, DATE_HEADER};
use glean_core::domain::PingRequest;
use glean_core::ports::{IPendingPingStore, IPingUploader, PendingPing, UploadResult};

use crate::operation::{Launcher, Operation};

/// Label of `glean.upload.ping_upload_failure` for pings dropped after retries
pub const RECOVERABLE_LABEL: &str = "recoverable";
/// Label of `glean.upload.ping_upload_failure` for rejected pings
pub const UNRECOVERABLE_LABEL: &str = "unrecoverable";

// ============================================================================
// UploadPolicy
// ============================================================================

/// Retry bounds for recoverable failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_recoverable_failures: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_recoverable_failures: config.max_recoverable_failures.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl UploadPolicy {
    /// Delay after the `attempts`-th failed attempt
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

// ============================================================================
// UploadManager
// ============================================================================

/// Owns the pending queue and the worker that drains it
pub struct UploadManager {
    pending: Arc<dyn IPendingPingStore>,
    uploader: Arc<dyn IPingUploader>,
    policy: UploadPolicy,
    wake: Notify,
    launcher: Launcher,
}

impl UploadManager {
    /// Creates a manager
    ///
    /// # Arguments
    /// * `launcher` - Receives `RecordUploadFailure` operations for dropped pings
    pub fn new(
        pending: Arc<dyn IPendingPingStore>,
        uploader: Arc<dyn IPingUploader>,
        policy: UploadPolicy,
        launcher: Launcher,
    ) -> Self {
        Self {
            pending,
            uploader,
            policy,
            wake: Notify::new(),
            launcher,
        }
    }

    /// Persists `request` and wakes the worker
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be persisted.
    pub async fn enqueue(&self, request: &PingRequest) -> anyhow::Result<()> {
        self.pending.enqueue(request).await?;
        debug!(
            document_id = %request.document_id,
            ping = %request.ping_name,
            "Ping queued for upload"
        );
        self.wake.notify_one();
        Ok(())
    }

    /// Drops every pending ping except those of `keep_ping`
    pub async fn clear_pending_except(&self, keep_ping: &str) -> anyhow::Result<u64> {
        self.pending.clear_except(keep_ping).await
    }

    pub async fn list_pending(&self) -> anyhow::Result<Vec<PendingPing>> {
        self.pending.list_pending().await
    }

    /// Worker loop
    ///
    /// Runs until `stop` is cancelled. Once `drain` is cancelled the loop also
    /// exits as soon as the queue is empty.
    pub async fn run(self: Arc<Self>, stop: CancellationToken, drain: CancellationToken) {
        info!("Upload worker started");

        loop {
            if stop.is_cancelled() {
                break;
            }

            let next = match self.pending.next_pending().await {
                Ok(next) => next,
                Err(e) => {
                    error!(error = %e, "Failed to read the pending ping queue");
                    if !sleep_or_stop(self.policy.base_backoff, &stop).await {
                        break;
                    }
                    continue;
                }
            };

            let Some(ping) = next else {
                if drain.is_cancelled() {
                    break;
                }
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = drain.cancelled() => continue,
                    _ = self.wake.notified() => continue,
                }
            };

            if let Some(delay) = self.process(ping).await {
                if !sleep_or_stop(delay, &stop).await {
                    break;
                }
            }
        }

        info!("Upload worker stopped");
    }

    /// Makes one attempt; returns the delay before the next one, if any
    async fn process(&self, ping: PendingPing) -> Option<Duration> {
        let mut request = ping.request;
        request
            .headers
            .insert(DATE_HEADER.to_string(), date_header_value(Utc::now()));

        let document_id = request.document_id.clone();
        let result = self.uploader.send(&request).await;

        match result {
            UploadResult::Success { status } => {
                info!(document_id = %document_id, ping = %request.ping_name, status, "Ping uploaded");
                self.discard(&document_id).await
            }
            UploadResult::UnrecoverableFailure { status } => {
                warn!(
                    document_id = %document_id,
                    ping = %request.ping_name,
                    status,
                    "Ping rejected by the server, dropping it"
                );
                self.report_failure(UNRECOVERABLE_LABEL);
                self.discard(&document_id).await
            }
            UploadResult::RecoverableFailure { retry_after } => {
                let attempts = match self.pending.record_attempt(&document_id).await {
                    Ok(n) => n,
                    Err(e) => {
                        error!(document_id = %document_id, error = %e, "Failed to record upload attempt");
                        return Some(self.policy.base_backoff);
                    }
                };

                if attempts >= self.policy.max_recoverable_failures {
                    warn!(
                        document_id = %document_id,
                        ping = %request.ping_name,
                        attempts,
                        "Ping upload kept failing, dropping it"
                    );
                    self.report_failure(RECOVERABLE_LABEL);
                    return self.discard(&document_id).await;
                }

                let delay = self
                    .policy
                    .backoff(attempts)
                    .max(retry_after.unwrap_or_default());
                debug!(
                    document_id = %document_id,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Recoverable upload failure, retrying later"
                );
                Some(delay)
            }
        }
    }

    async fn discard(&self, document_id: &str) -> Option<Duration> {
        match self.pending.remove_pending(document_id).await {
            Ok(()) => None,
            Err(e) => {
                error!(document_id, error = %e, "Failed to remove ping from the queue");
                Some(self.policy.base_backoff)
            }
        }
    }

    fn report_failure(&self, label: &str) {
        (self.launcher)(Operation::RecordUploadFailure {
            label: label.to_string(),
        });
    }
}

/// Sleeps for `delay`; returns false if `stop` fired first
async fn sleep_or_stop(delay: Duration, stop: &CancellationToken) -> bool {
    tokio::select! {
        _ = stop.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
