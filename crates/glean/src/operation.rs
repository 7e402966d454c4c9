//! Dispatched operations
//!
//! Every public call becomes one [`Operation`] value. Operations are plain
//! data so a pre-init queue can be inspected, replayed, or serialized.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use glean_core::domain::{
    CommonMetricData, Datetime, DebugTag, ErrorType, PingType, RemoteConfig, SourceTags,
};

/// A metric mutation, validated by the typed handle that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordAction {
    SetBoolean(bool),
    /// Positive increment; saturates at `i32::MAX`
    AddCounter(i32),
    SetQuantity(i64),
    SetString(String),
    SetStringList(Vec<String>),
    AppendString(String),
    SetUuid(String),
    SetDatetime(Datetime),
    AddLabeledCounter {
        label: String,
        amount: i32,
        /// Static label set; `None` for dynamic labels
        labels: Option<Vec<String>>,
    },
}

/// A unit of work for the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Operation {
    Record {
        meta: CommonMetricData,
        action: RecordAction,
    },
    /// Counts a validation failure against `meta`
    RecordError {
        meta: CommonMetricData,
        error: ErrorType,
        count: i32,
    },
    RegisterPing(PingType),
    SubmitPing {
        name: String,
        reason: Option<String>,
    },
    /// Fired by the metrics ping timer
    SubmitScheduledMetricsPing {
        reason: String,
    },
    SetCollectionEnabled(bool),
    SetExperimentActive {
        id: String,
        branch: String,
        extra: Option<BTreeMap<String, String>>,
    },
    SetExperimentInactive {
        id: String,
    },
    ApplyServerKnobs(RemoteConfig),
    SetDebugViewTag(DebugTag),
    SetSourceTags(SourceTags),
    SetLogPings(bool),
    /// An upload was dropped; `label` is `recoverable` or `unrecoverable`
    RecordUploadFailure {
        label: String,
    },
    /// Tasks lost to the pre-init bound
    RecordPreinitOverflow(u32),
}

/// Hands an operation to the dispatcher from outside the public API
///
/// Background workers (scheduler timer, upload worker) report back through
/// this so their effects stay serialized with everything else.
pub type Launcher = Arc<dyn Fn(Operation) + Send + Sync>;

impl Operation {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Record { .. } => "record",
            Operation::RecordError { .. } => "record_error",
            Operation::RegisterPing(_) => "register_ping",
            Operation::SubmitPing { .. } => "submit_ping",
            Operation::SubmitScheduledMetricsPing { .. } => "submit_scheduled_metrics_ping",
            Operation::SetCollectionEnabled(_) => "set_collection_enabled",
            Operation::SetExperimentActive { .. } => "set_experiment_active",
            Operation::SetExperimentInactive { .. } => "set_experiment_inactive",
            Operation::ApplyServerKnobs(_) => "apply_server_knobs",
            Operation::SetDebugViewTag(_) => "set_debug_view_tag",
            Operation::SetSourceTags(_) => "set_source_tags",
            Operation::SetLogPings(_) => "set_log_pings",
            Operation::RecordUploadFailure { .. } => "record_upload_failure",
            Operation::RecordPreinitOverflow(_) => "record_preinit_overflow",
        }
    }
}
