//! Port definitions (hexagonal architecture interfaces)
//!
//! ## Ports Overview
//!
//! - [`IMetricStore`] - Durable metric values keyed by store and identifier
//! - [`IPendingPingStore`] - Durable FIFO of assembled pings awaiting upload
//! - [`IPingUploader`] - The external uploader capability

pub mod metric_store;
pub mod pending_pings;
pub mod uploader;

pub use metric_store::{IMetricStore, StoredMetric};
pub use pending_pings::{IPendingPingStore, PendingPing};
pub use uploader::{IPingUploader, UploadResult};
