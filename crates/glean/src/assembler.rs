//! Ping assembly
//!
//! Turns the current content of a ping's store into a JSON document:
//!
//! ```text
//! { "ping_info": {..}, "client_info": {..}, "metrics": { "<kind>": { "<id>": value } } }
//! ```
//!
//! Collecting a ping clears its ping-lifetime values. Sequence numbers and
//! start times are kept in the internal store so they survive restarts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, warn};

use glean_core::domain::datetime::local_now;
use glean_core::domain::metric::{Lifetime, Metric, LABEL_SEPARATOR};
use glean_core::domain::ping::{CLIENT_INFO_STORAGE, INTERNAL_STORAGE};
use glean_core::domain::{Datetime, PingType, TimeUnit};
use glean_core::ports::{IMetricStore, StoredMetric};

use crate::internal_metrics;

/// Identifier under which the experimentation id is reported
pub const EXPERIMENTATION_ID_METRIC: &str = "glean.client.annotation.experimentation_id";

/// Core state the document depends on
#[derive(Debug, Clone)]
pub struct AssemblyContext {
    /// `ping_info.experiments`, if any experiment is active
    pub experiments: Option<JsonValue>,
    pub experimentation_id: Option<String>,
    /// Start time of a ping's first document
    pub session_start: DateTime<FixedOffset>,
}

/// An assembled document, before serialization
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPing {
    pub document_id: String,
    pub content: JsonValue,
    pub has_info_sections: bool,
}

/// Builds ping documents from a metric store
pub struct PingAssembler {
    store: Arc<dyn IMetricStore>,
}

impl PingAssembler {
    pub fn new(store: Arc<dyn IMetricStore>) -> Self {
        Self { store }
    }

    /// Collects `ping` into a document
    ///
    /// Returns `Ok(None)` when the store is empty and the ping is not sent
    /// empty. `reason` is reported only if the ping declares it.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn assemble(
        &self,
        ping: &PingType,
        reason: Option<&str>,
        ctx: &AssemblyContext,
    ) -> anyhow::Result<Option<AssembledPing>> {
        let snapshot = self.store.snapshot_and_clear(&ping.name).await?;

        if snapshot.is_empty() && !ping.send_if_empty {
            debug!(ping = %ping.name, "Storage is empty, ping not assembled");
            return Ok(None);
        }

        let mut content = Map::new();
        if ping.include_info_sections {
            content.insert(
                "ping_info".to_string(),
                self.ping_info(ping, reason, ctx).await?,
            );
            content.insert("client_info".to_string(), self.client_info(ping).await?);
        }

        let metrics = metrics_payload(&snapshot, ctx.experimentation_id.as_deref());
        if !metrics.is_empty() {
            content.insert("metrics".to_string(), JsonValue::Object(metrics));
        }

        Ok(Some(AssembledPing {
            document_id: uuid::Uuid::new_v4().to_string(),
            content: JsonValue::Object(content),
            has_info_sections: ping.include_info_sections,
        }))
    }

    async fn ping_info(
        &self,
        ping: &PingType,
        reason: Option<&str>,
        ctx: &AssemblyContext,
    ) -> anyhow::Result<JsonValue> {
        let seq = self.next_sequence(&ping.name).await?;

        let unit = if ping.precise_timestamps {
            TimeUnit::Millisecond
        } else {
            TimeUnit::Minute
        };
        let end = local_now();
        let start = self.swap_start_time(&ping.name, end).await?;
        let start = start.unwrap_or(ctx.session_start);

        let mut info = Map::new();
        info.insert("seq".to_string(), json!(seq));
        info.insert(
            "start_time".to_string(),
            json!(Datetime::new(start, unit).to_formatted_string()),
        );
        info.insert(
            "end_time".to_string(),
            json!(Datetime::new(end, unit).to_formatted_string()),
        );

        if let Some(reason) = reason {
            if ping.accepts_reason(reason) {
                info.insert("reason".to_string(), json!(reason));
            } else {
                warn!(ping = %ping.name, reason, "Reason not declared for ping, omitted");
            }
        }

        if let Some(experiments) = &ctx.experiments {
            info.insert("experiments".to_string(), experiments.clone());
        }

        Ok(JsonValue::Object(info))
    }

    async fn client_info(&self, ping: &PingType) -> anyhow::Result<JsonValue> {
        let mut info = Map::new();
        for metric in self.store.snapshot(CLIENT_INFO_STORAGE).await? {
            info.insert(metric.identifier, metric.value.as_json());
        }
        if !ping.include_client_id {
            info.remove(&internal_metrics::client_id().identifier());
        }
        Ok(JsonValue::Object(info))
    }

    /// Returns the current sequence number of `ping` and advances it
    async fn next_sequence(&self, ping: &str) -> anyhow::Result<i32> {
        let id = internal_metrics::sequence_number(ping).identifier();
        let current = match self.store.get(INTERNAL_STORAGE, &id).await? {
            Some(Metric::Counter(n)) => n,
            _ => 0,
        };
        self.store
            .record(
                INTERNAL_STORAGE,
                &id,
                Lifetime::User,
                &Metric::Counter(current.saturating_add(1)),
            )
            .await?;
        Ok(current)
    }

    /// Stores `end` as the next start time and returns the previous one
    async fn swap_start_time(
        &self,
        ping: &str,
        end: DateTime<FixedOffset>,
    ) -> anyhow::Result<Option<DateTime<FixedOffset>>> {
        let id = internal_metrics::ping_start_time(ping).identifier();
        let previous = match self.store.get(INTERNAL_STORAGE, &id).await? {
            Some(Metric::Datetime(d)) => Some(d.value()),
            _ => None,
        };
        self.store
            .record(
                INTERNAL_STORAGE,
                &id,
                Lifetime::User,
                &Metric::Datetime(Datetime::new(end, TimeUnit::Nanosecond)),
            )
            .await?;
        Ok(previous)
    }
}

/// Groups stored values by kind; labeled counters nest by label
fn metrics_payload(
    snapshot: &[StoredMetric],
    experimentation_id: Option<&str>,
) -> Map<String, JsonValue> {
    let mut sections: BTreeMap<&'static str, BTreeMap<String, JsonValue>> = BTreeMap::new();
    let mut labeled: BTreeMap<String, BTreeMap<String, JsonValue>> = BTreeMap::new();

    for metric in snapshot {
        if let (Some((base, label)), Metric::Counter(n)) =
            (metric.identifier.split_once(LABEL_SEPARATOR), &metric.value)
        {
            labeled
                .entry(base.to_string())
                .or_default()
                .insert(label.to_string(), json!(n));
            continue;
        }
        sections
            .entry(metric.value.ping_section())
            .or_default()
            .insert(metric.identifier.clone(), metric.value.as_json());
    }

    if !snapshot.is_empty() {
        if let Some(id) = experimentation_id {
            sections
                .entry("string")
                .or_default()
                .insert(EXPERIMENTATION_ID_METRIC.to_string(), json!(id));
        }
    }

    let mut out = Map::new();
    for (section, values) in sections {
        out.insert(section.to_string(), json!(values));
    }
    if !labeled.is_empty() {
        out.insert("labeled_counter".to_string(), json!(labeled));
    }
    out
}
