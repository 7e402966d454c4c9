//! Metric store port (driven/secondary port)
//!
//! A "store" is a ping name or one of the reserved internal stores. A metric
//! sent in several pings is written once per store.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Callers serialize all writes through the dispatcher; implementations
//!   only need to tolerate concurrent readers.

use crate::domain::metric::{Lifetime, Metric};

/// A value as returned by a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMetric {
    pub identifier: String,
    pub lifetime: Lifetime,
    pub value: Metric,
}

/// Port for metric persistence
#[async_trait::async_trait]
pub trait IMetricStore: Send + Sync {
    /// Inserts or replaces the value of `identifier` in `store`
    async fn record(
        &self,
        store: &str,
        identifier: &str,
        lifetime: Lifetime,
        value: &Metric,
    ) -> anyhow::Result<()>;

    /// Current value of `identifier` in `store`
    async fn get(&self, store: &str, identifier: &str) -> anyhow::Result<Option<Metric>>;

    /// Removes a single value
    async fn remove(&self, store: &str, identifier: &str) -> anyhow::Result<()>;

    /// All values in `store`, ordered by identifier
    async fn snapshot(&self, store: &str) -> anyhow::Result<Vec<StoredMetric>>;

    /// All values in `store`, then deletes its ping-lifetime entries
    ///
    /// Read and delete happen in one transaction, so no value recorded in
    /// between can be lost.
    async fn snapshot_and_clear(&self, store: &str) -> anyhow::Result<Vec<StoredMetric>>;

    /// Deletes every value outside `preserve_stores`
    async fn clear_all(&self, preserve_stores: &[&str]) -> anyhow::Result<()>;
}
