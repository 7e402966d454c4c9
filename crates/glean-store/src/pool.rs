//! Database connection pool management
//!
//! Wraps SQLx's `SqlitePool`:
//! - the database lives at `<data_path>/db/glean.sqlite`
//! - WAL journal mode so test getters can read while the worker writes
//! - schema migration on open
//! - in-memory mode for tests

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::StoreError;

/// Directory under the data path holding the database
const DB_DIR: &str = "db";
/// Database file name
const DB_FILE: &str = "glean.sqlite";

/// A pool of SQLite connections to the metric database
///
/// File-backed pools allow 5 connections with a 5-second busy timeout;
/// in-memory pools use a single connection, since each SQLite in-memory
/// connection is its own database.
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Location of the database for a given data path
    pub fn database_path(data_path: &Path) -> PathBuf {
        data_path.join(DB_DIR).join(DB_FILE)
    }

    /// Opens (creating if needed) the database below `data_path`
    ///
    /// # Errors
    ///
    /// See [`DatabasePool::new`].
    pub async fn open_in(data_path: &Path) -> Result<Self, StoreError> {
        Self::new(&Self::database_path(data_path)).await
    }

    /// Opens the database file at `db_path`
    ///
    /// Parent directories and the file itself are created when missing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectionFailed` if the connection cannot be established,
    /// or `StoreError::MigrationFailed` if schema migrations fail.
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "Failed to open database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(path = %db_path.display(), "Metric database opened");

        Ok(Self { pool })
    }

    /// Creates an in-memory database for tests
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectionFailed` if the connection cannot be established,
    /// or `StoreError::MigrationFailed` if schema migrations fail.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            // The database lives only as long as its single connection
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                StoreError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory metric database opened");

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection; pending writes are flushed first
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("Metric database closed");
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
        let migration_sql = include_str!("migrations/20261019_initial.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| {
                StoreError::MigrationFailed(format!("Failed to run initial migration: {}", e))
            })?;

        tracing::debug!("Database migrations completed");
        Ok(())
    }
}
