//! Pending ping queue port (driven/secondary port)
//!
//! Assembled pings are persisted before upload so they survive restarts.
//! The queue is strictly FIFO in assembly order.

use chrono::{DateTime, Utc};

use crate::domain::request::PingRequest;

/// A queued request and its retry bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPing {
    /// Monotonic position in the queue
    pub seq: i64,
    pub request: PingRequest,
    /// Failed upload attempts so far
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// Port for the durable upload queue
#[async_trait::async_trait]
pub trait IPendingPingStore: Send + Sync {
    /// Appends a request; re-enqueueing an existing document id is a no-op
    async fn enqueue(&self, request: &PingRequest) -> anyhow::Result<()>;

    /// Oldest queued request
    async fn next_pending(&self) -> anyhow::Result<Option<PendingPing>>;

    /// Every queued request in queue order
    async fn list_pending(&self) -> anyhow::Result<Vec<PendingPing>>;

    /// Increments the attempt counter and returns the new value
    async fn record_attempt(&self, document_id: &str) -> anyhow::Result<u32>;

    /// Drops a request after it was sent or abandoned
    async fn remove_pending(&self, document_id: &str) -> anyhow::Result<()>;

    /// Drops every request whose ping is not `keep_ping`
    ///
    /// Returns the number of requests removed.
    async fn clear_except(&self, keep_ping: &str) -> anyhow::Result<u64>;
}
