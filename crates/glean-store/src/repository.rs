//! SQLite implementation of IMetricStore and IPendingPingStore
//!
//! ## Type Mapping
//!
//! | Domain Type       | SQL Type | Strategy                                   |
//! |-------------------|----------|--------------------------------------------|
//! | Metric            | TEXT     | serde_json, tagged by kind                 |
//! | Lifetime          | TEXT     | `Lifetime::as_str()` / `Lifetime::parse()` |
//! | PingRequest body  | BLOB     | raw bytes                                  |
//! | PingRequest headers | TEXT   | serde_json object                          |
//! | DateTime<Utc>     | TEXT     | ISO 8601 via `to_rfc3339()`                |

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use glean_core::domain::metric::{Lifetime, Metric};
use glean_core::domain::request::PingRequest;
use glean_core::ports::{IMetricStore, IPendingPingStore, PendingPing, StoredMetric};

use crate::StoreError;

/// SQLite-backed metric store and pending-ping queue
#[derive(Clone)]
pub struct SqliteMetricStore {
    pool: SqlitePool,
}

impl SqliteMetricStore {
    /// Creates a new store on the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Deletes every metric and every pending ping
    pub async fn wipe(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM metrics").execute(&self.pool).await?;
        sqlx::query("DELETE FROM pending_pings")
            .execute(&self.pool)
            .await?;
        tracing::debug!("Wiped metric database");
        Ok(())
    }
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn parse_lifetime(s: &str) -> Result<Lifetime, StoreError> {
    Lifetime::parse(s)
        .ok_or_else(|| StoreError::SerializationError(format!("Unknown lifetime: {}", s)))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn stored_metric_from_row(row: &SqliteRow) -> Result<StoredMetric, StoreError> {
    let lifetime: String = row.get("lifetime");
    let value: String = row.get("value");
    Ok(StoredMetric {
        identifier: row.get("identifier"),
        lifetime: parse_lifetime(&lifetime)?,
        value: serde_json::from_str(&value)
            .map_err(|e| StoreError::SerializationError(format!("Bad metric value: {}", e)))?,
    })
}

fn pending_ping_from_row(row: &SqliteRow) -> Result<PendingPing, StoreError> {
    let headers: String = row.get("headers");
    let headers: BTreeMap<String, String> = serde_json::from_str(&headers)
        .map_err(|e| StoreError::SerializationError(format!("Bad ping headers: {}", e)))?;
    let attempts: i64 = row.get("attempts");
    let enqueued_at: String = row.get("enqueued_at");

    Ok(PendingPing {
        seq: row.get("seq"),
        request: PingRequest {
            document_id: row.get("document_id"),
            ping_name: row.get("ping_name"),
            path: row.get("path"),
            body: row.get("body"),
            headers,
            body_has_info_sections: row.get("body_has_info_sections"),
        },
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        enqueued_at: parse_datetime(&enqueued_at)?,
    })
}

// ============================================================================
// IMetricStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IMetricStore for SqliteMetricStore {
    async fn record(
        &self,
        store: &str,
        identifier: &str,
        lifetime: Lifetime,
        value: &Metric,
    ) -> anyhow::Result<()> {
        let value = serde_json::to_string(value)
            .map_err(|e| anyhow::anyhow!("Failed to serialize metric: {}", e))?;

        sqlx::query(
            "INSERT INTO metrics (store, identifier, lifetime, value, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (store, identifier) DO UPDATE SET \
             lifetime = excluded.lifetime, value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(store)
        .bind(identifier)
        .bind(lifetime.as_str())
        .bind(&value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(store, identifier, "Recorded metric");
        Ok(())
    }

    async fn get(&self, store: &str, identifier: &str) -> anyhow::Result<Option<Metric>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM metrics WHERE store = ? AND identifier = ?")
                .bind(store)
                .bind(identifier)
                .fetch_optional(&self.pool)
                .await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v).map_err(|e| {
                StoreError::SerializationError(format!("Bad metric value: {}", e))
            })?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, store: &str, identifier: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM metrics WHERE store = ? AND identifier = ?")
            .bind(store)
            .bind(identifier)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn snapshot(&self, store: &str) -> anyhow::Result<Vec<StoredMetric>> {
        let rows = sqlx::query(
            "SELECT identifier, lifetime, value FROM metrics WHERE store = ? ORDER BY identifier",
        )
        .bind(store)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| stored_metric_from_row(r).map_err(Into::into))
            .collect()
    }

    async fn snapshot_and_clear(&self, store: &str) -> anyhow::Result<Vec<StoredMetric>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT identifier, lifetime, value FROM metrics WHERE store = ? ORDER BY identifier",
        )
        .bind(store)
        .fetch_all(&mut *tx)
        .await?;

        let cleared = sqlx::query("DELETE FROM metrics WHERE store = ? AND lifetime = ?")
            .bind(store)
            .bind(Lifetime::Ping.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::debug!(store, snapshot = rows.len(), cleared, "Collected store");

        rows.iter()
            .map(|r| stored_metric_from_row(r).map_err(Into::into))
            .collect()
    }

    async fn clear_all(&self, preserve_stores: &[&str]) -> anyhow::Result<()> {
        let mut sql = String::from("DELETE FROM metrics");
        if !preserve_stores.is_empty() {
            let placeholders = vec!["?"; preserve_stores.len()].join(", ");
            sql.push_str(&format!(" WHERE store NOT IN ({})", placeholders));
        }

        let mut query = sqlx::query(&sql);
        for store in preserve_stores {
            query = query.bind(*store);
        }
        let removed = query.execute(&self.pool).await?.rows_affected();

        tracing::debug!(removed, "Cleared metric stores");
        Ok(())
    }
}

// ============================================================================
// IPendingPingStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IPendingPingStore for SqliteMetricStore {
    async fn enqueue(&self, request: &PingRequest) -> anyhow::Result<()> {
        let headers = serde_json::to_string(&request.headers)
            .map_err(|e| anyhow::anyhow!("Failed to serialize headers: {}", e))?;

        sqlx::query(
            "INSERT OR IGNORE INTO pending_pings \
             (document_id, ping_name, path, body, headers, body_has_info_sections, attempts, enqueued_at) \
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&request.document_id)
        .bind(&request.ping_name)
        .bind(&request.path)
        .bind(&request.body)
        .bind(&headers)
        .bind(request.body_has_info_sections)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(document_id = %request.document_id, ping = %request.ping_name, "Queued ping");
        Ok(())
    }

    async fn next_pending(&self) -> anyhow::Result<Option<PendingPing>> {
        let row = sqlx::query("SELECT * FROM pending_pings ORDER BY seq ASC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(pending_ping_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_pending(&self) -> anyhow::Result<Vec<PendingPing>> {
        let rows = sqlx::query("SELECT * FROM pending_pings ORDER BY seq ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| pending_ping_from_row(r).map_err(Into::into))
            .collect()
    }

    async fn record_attempt(&self, document_id: &str) -> anyhow::Result<u32> {
        let attempts: Option<i64> = sqlx::query_scalar(
            "UPDATE pending_pings SET attempts = attempts + 1 WHERE document_id = ? RETURNING attempts",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        let attempts =
            attempts.ok_or_else(|| anyhow::anyhow!("No pending ping {}", document_id))?;
        Ok(u32::try_from(attempts).unwrap_or(u32::MAX))
    }

    async fn remove_pending(&self, document_id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM pending_pings WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_except(&self, keep_ping: &str) -> anyhow::Result<u64> {
        let removed = sqlx::query("DELETE FROM pending_pings WHERE ping_name != ?")
            .bind(keep_ping)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!(removed, keep = keep_ping, "Dropped pending pings");
        Ok(removed)
    }
}
