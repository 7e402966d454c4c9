//! Glean Store - Local metric and ping persistence
//!
//! SQLite-based storage for:
//! - Metric values, partitioned by store (ping name) and lifetime
//! - The pending-upload queue of assembled pings
//!
//! ## Architecture
//!
//! This crate implements the `IMetricStore` and `IPendingPingStore` ports
//! from `glean-core` using SQLite as the storage backend.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteMetricStore`] - Implementation of both storage ports
//! - [`StoreError`] - Error types for storage operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use glean_store::{DatabasePool, SqliteMetricStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/glean/db/glean.sqlite")).await?;
//! let store = SqliteMetricStore::new(pool.pool().clone());
//! // Use store as IMetricStore and IPendingPingStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteMetricStore;

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
