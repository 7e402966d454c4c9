//! Core orchestration
//!
//! [`GleanCore`] is the single consumer of the dispatcher. Every metric
//! mutation, ping submission and state transition runs here, one at a time,
//! so neither the store nor [`CoreState`] need finer-grained coordination.
//!
//! ## Collection state
//!
//! Turning collection off submits exactly one "deletion-request" ping, then
//! clears pending uploads and stored metrics. Because the dispatcher is
//! FIFO, recordings launched after the disable call are applied afterwards
//! and become no-ops.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, FixedOffset};
use tracing::{debug, error, info, trace, warn};

use glean_core::config::Configuration;
use glean_core::domain::datetime::local_now;
use glean_core::domain::metric::{CommonMetricData, ErrorType, Lifetime, Metric, LABEL_SEPARATOR};
use glean_core::domain::ping::{
    CLIENT_INFO_STORAGE, DELETION_REQUEST_PING_NAME, INTERNAL_STORAGE, KNOWN_CLIENT_ID,
    METRICS_PING_NAME,
};
use glean_core::domain::request::{submission_path, DEBUG_ID_HEADER, SOURCE_TAGS_HEADER};
use glean_core::domain::{
    Datetime, DebugTag, DomainError, ExperimentRegistry, PingRequest, PingType, RemoteConfig,
    SourceTags, TimeUnit,
};
use glean_core::ports::IMetricStore;

use crate::assembler::{AssemblyContext, PingAssembler};
use crate::dispatcher::TaskHandler;
use crate::error_recording::error_metric;
use crate::internal_metrics;
use crate::metrics::labeled_counter::{is_valid_dynamic_label, MAX_LABELS, OTHER_LABEL};
use crate::metrics::string_list::MAX_LIST_LENGTH;
use crate::operation::{Operation, RecordAction};
use crate::scheduler::{decide, ScheduleState, When};
use crate::system::SystemInfo;
use crate::upload::{UploadManager, RECOVERABLE_LABEL, UNRECOVERABLE_LABEL};

/// Reason of the deletion-request sent when collection is turned off
pub const REASON_SET_UPLOAD_ENABLED: &str = "set_upload_enabled";
/// Reason of the deletion-request sent when collection was off at startup
pub const REASON_AT_INIT: &str = "at_init";

// ============================================================================
// CoreState
// ============================================================================

/// Mutable state owned by the core
///
/// Written only by the dispatcher worker; test getters read it after the
/// queue has drained.
#[derive(Debug, Clone)]
pub struct CoreState {
    pub collection_enabled: bool,
    pub debug_view_tag: Option<DebugTag>,
    pub source_tags: Option<SourceTags>,
    pub log_pings: bool,
    pub experiments: ExperimentRegistry,
    pub experimentation_id: Option<String>,
    pub remote_config: RemoteConfig,
    pub pings: HashMap<String, PingType>,
    pub metrics_ping: ScheduleState,
    pub start_time: DateTime<FixedOffset>,
}

impl Default for CoreState {
    fn default() -> Self {
        Self {
            collection_enabled: true,
            debug_view_tag: None,
            source_tags: None,
            log_pings: false,
            experiments: ExperimentRegistry::new(),
            experimentation_id: None,
            remote_config: RemoteConfig::default(),
            pings: HashMap::new(),
            metrics_ping: ScheduleState::Idle,
            start_time: local_now(),
        }
    }
}

/// State shared between the core and the public facade
pub type SharedState = Arc<RwLock<CoreState>>;

// ============================================================================
// GleanCore
// ============================================================================

/// Applies dispatched operations
pub struct GleanCore {
    config: Arc<Configuration>,
    state: SharedState,
    store: Arc<dyn IMetricStore>,
    upload: Arc<UploadManager>,
    assembler: PingAssembler,
    system: SystemInfo,
}

impl GleanCore {
    pub fn new(
        config: Arc<Configuration>,
        state: SharedState,
        store: Arc<dyn IMetricStore>,
        upload: Arc<UploadManager>,
        system: SystemInfo,
    ) -> Self {
        Self {
            config,
            state,
            assembler: PingAssembler::new(store.clone()),
            store,
            upload,
            system,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Brings stored client info in line with the configuration
    ///
    /// Runs before the pre-init queue is replayed.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        {
            let mut state = self.write_state();
            for ping in [PingType::metrics(), PingType::deletion_request()] {
                state.pings.insert(ping.name.clone(), ping);
            }
            state.collection_enabled = self.config.upload_enabled;
            state.experimentation_id = self.config.experimentation_id.clone();
            state.log_pings = self.config.logging.log_pings;
            state.start_time = local_now();
        }

        if self.config.upload_enabled {
            return self.init_client_info().await;
        }

        match self.stored_client_id().await? {
            Some(id) if id != KNOWN_CLIENT_ID => {
                info!("Collection disabled since the last run, sending deletion-request");
                self.submit_ping(DELETION_REQUEST_PING_NAME, Some(REASON_AT_INIT))
                    .await?;
                self.clear_metrics().await
            }
            Some(_) => Ok(()),
            None => self.write_client_id(KNOWN_CLIENT_ID).await,
        }
    }

    /// Submits an overdue or upgrade metrics ping and returns the first boundary
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn schedule_metrics_ping(&self) -> anyhow::Result<When> {
        let last_sent = self.last_sent_time().await?;
        let last_build = match self
            .store
            .get(INTERNAL_STORAGE, &internal_metrics::last_sent_build().identifier())
            .await?
        {
            Some(Metric::String(build)) => Some(build),
            _ => None,
        };

        let decision = decide(
            local_now(),
            last_sent,
            last_build.as_deref(),
            &self.config.app_build,
            self.config.scheduler.metrics_ping_hour,
        );
        debug!(?decision, "Metrics ping startup decision");

        if let Some(reason) = decision.submit_now {
            self.submit_metrics_ping(reason).await?;
        }
        self.write_internal(
            &internal_metrics::last_sent_build(),
            Metric::String(self.config.app_build.clone()),
        )
        .await?;

        Ok(decision.next)
    }

    // ------------------------------------------------------------------------
    // Operation dispatch
    // ------------------------------------------------------------------------

    async fn apply(&self, op: Operation) -> anyhow::Result<()> {
        match op {
            Operation::Record { meta, action } => self.record(&meta, action).await,
            Operation::RecordError { meta, error, count } => {
                self.record_error(&meta, error, count).await
            }
            Operation::RegisterPing(ping) => {
                debug!(ping = %ping.name, "Registered ping");
                self.write_state().pings.insert(ping.name.clone(), ping);
                Ok(())
            }
            Operation::SubmitPing { name, reason } => {
                self.submit_ping(&name, reason.as_deref()).await.map(|_| ())
            }
            Operation::SubmitScheduledMetricsPing { reason } => {
                self.submit_scheduled_metrics_ping(&reason).await
            }
            Operation::SetCollectionEnabled(enabled) => {
                self.set_collection_enabled(enabled).await
            }
            Operation::SetExperimentActive { id, branch, extra } => {
                let truncated = self.write_state().experiments.set_active(&id, &branch, extra);
                if truncated {
                    warn!(experiment = %id, "Experiment data was truncated");
                }
                Ok(())
            }
            Operation::SetExperimentInactive { id } => {
                self.write_state().experiments.set_inactive(&id);
                Ok(())
            }
            Operation::ApplyServerKnobs(config) => {
                info!(
                    metrics = config.metrics_enabled.len(),
                    pings = config.pings_enabled.len(),
                    "Applied remote configuration"
                );
                self.write_state().remote_config = config;
                Ok(())
            }
            Operation::SetDebugViewTag(tag) => {
                info!(tag = %tag.as_str(), "Debug view tag set");
                self.write_state().debug_view_tag = Some(tag);
                Ok(())
            }
            Operation::SetSourceTags(tags) => {
                info!(tags = %tags.header_value(), "Source tags set");
                self.write_state().source_tags = Some(tags);
                Ok(())
            }
            Operation::SetLogPings(enabled) => {
                self.write_state().log_pings = enabled;
                Ok(())
            }
            Operation::RecordUploadFailure { label } => {
                let labels = vec![RECOVERABLE_LABEL.to_string(), UNRECOVERABLE_LABEL.to_string()];
                self.record(
                    &internal_metrics::ping_upload_failure(),
                    RecordAction::AddLabeledCounter {
                        label,
                        amount: 1,
                        labels: Some(labels),
                    },
                )
                .await
            }
            Operation::RecordPreinitOverflow(count) => {
                let count = i32::try_from(count).unwrap_or(i32::MAX);
                self.record(
                    &internal_metrics::preinit_tasks_overflow(),
                    RecordAction::AddCounter(count),
                )
                .await
            }
        }
    }

    // ------------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------------

    /// Stores `meta` may be written to right now
    ///
    /// Empty when the metric is disabled (remote override first, then its
    /// default). While collection is off only pings that ignore the
    /// collection state are eligible.
    fn stores_for(&self, meta: &CommonMetricData) -> Vec<String> {
        let state = self.read_state();
        if state
            .remote_config
            .metric_disabled(&meta.base_identifier(), meta.disabled)
        {
            return Vec::new();
        }
        if state.collection_enabled {
            return meta.send_in_pings.clone();
        }
        meta.send_in_pings
            .iter()
            .filter(|name| {
                state.pings.get(*name).is_some_and(|ping| {
                    !ping.follows_collection_enabled
                        && state.remote_config.ping_enabled(&ping.name, ping.enabled)
                })
            })
            .cloned()
            .collect()
    }

    async fn record(&self, meta: &CommonMetricData, action: RecordAction) -> anyhow::Result<()> {
        let stores = self.stores_for(meta);
        if stores.is_empty() {
            trace!(metric = %meta.identifier(), "Metric not recorded");
            return Ok(());
        }

        let id = meta.identifier();
        let lifetime = meta.lifetime;
        match action {
            RecordAction::SetBoolean(v) => self.write(&stores, &id, lifetime, Metric::Boolean(v)).await,
            RecordAction::AddCounter(amount) => {
                let mut conflicted = false;
                for store in &stores {
                    conflicted |= !self.add_to_counter(store, &id, lifetime, amount).await?;
                }
                if conflicted {
                    self.record_error(meta, ErrorType::InvalidState, 1).await?;
                }
                Ok(())
            }
            RecordAction::SetQuantity(v) => self.write(&stores, &id, lifetime, Metric::Quantity(v)).await,
            RecordAction::SetString(v) => self.write(&stores, &id, lifetime, Metric::String(v)).await,
            RecordAction::SetStringList(v) => {
                self.write(&stores, &id, lifetime, Metric::StringList(v)).await
            }
            RecordAction::AppendString(value) => {
                let mut overflowed = false;
                let mut conflicted = false;
                for store in &stores {
                    let mut list = match self.store.get(store, &id).await? {
                        Some(Metric::StringList(list)) => list,
                        None => Vec::new(),
                        Some(_) => {
                            conflicted = true;
                            continue;
                        }
                    };
                    if list.len() >= MAX_LIST_LENGTH {
                        overflowed = true;
                        continue;
                    }
                    list.push(value.clone());
                    self.store
                        .record(store, &id, lifetime, &Metric::StringList(list))
                        .await?;
                }
                if overflowed {
                    self.record_error(meta, ErrorType::InvalidOverflow, 1).await?;
                }
                if conflicted {
                    self.record_error(meta, ErrorType::InvalidState, 1).await?;
                }
                Ok(())
            }
            RecordAction::SetUuid(v) => self.write(&stores, &id, lifetime, Metric::Uuid(v)).await,
            RecordAction::SetDatetime(v) => self.write(&stores, &id, lifetime, Metric::Datetime(v)).await,
            RecordAction::AddLabeledCounter { label, amount, labels } => {
                self.add_labeled(meta, &stores, label, amount, labels).await
            }
        }
    }

    async fn write(
        &self,
        stores: &[String],
        identifier: &str,
        lifetime: Lifetime,
        value: Metric,
    ) -> anyhow::Result<()> {
        for store in stores {
            self.store.record(store, identifier, lifetime, &value).await?;
        }
        Ok(())
    }

    /// Adds `amount` to a stored counter
    ///
    /// Returns `false` and leaves the value alone when `identifier` already
    /// holds another kind of metric.
    async fn add_to_counter(
        &self,
        store: &str,
        identifier: &str,
        lifetime: Lifetime,
        amount: i32,
    ) -> anyhow::Result<bool> {
        let current = match self.store.get(store, identifier).await? {
            Some(Metric::Counter(n)) => n,
            None => 0,
            Some(other) => {
                warn!(
                    metric = identifier,
                    store,
                    stored = other.ping_section(),
                    "Stored value is not a counter"
                );
                return Ok(false);
            }
        };
        self.store
            .record(
                store,
                identifier,
                lifetime,
                &Metric::Counter(current.saturating_add(amount)),
            )
            .await?;
        Ok(true)
    }

    /// Resolves the effective label, then adds to it in every store
    async fn add_labeled(
        &self,
        meta: &CommonMetricData,
        stores: &[String],
        label: String,
        amount: i32,
        static_labels: Option<Vec<String>>,
    ) -> anyhow::Result<()> {
        let dynamic = static_labels.is_none();
        let label = match static_labels {
            Some(labels) if labels.contains(&label) => label,
            Some(_) => OTHER_LABEL.to_string(),
            None if is_valid_dynamic_label(&label) => label,
            None => {
                warn!(metric = %meta.base_identifier(), "Invalid label, recorded as {OTHER_LABEL}");
                self.record_error(meta, ErrorType::InvalidLabel, 1).await?;
                OTHER_LABEL.to_string()
            }
        };

        let prefix = format!("{}{}", meta.base_identifier(), LABEL_SEPARATOR);
        for store in stores {
            let mut effective = label.clone();
            if dynamic && effective != OTHER_LABEL {
                let id = meta.with_label(&effective).identifier();
                if self.store.get(store, &id).await?.is_none() {
                    let used = self
                        .store
                        .snapshot(store)
                        .await?
                        .iter()
                        .filter_map(|m| m.identifier.strip_prefix(&prefix))
                        .filter(|l| *l != OTHER_LABEL)
                        .count();
                    if used >= MAX_LABELS {
                        debug!(metric = %meta.base_identifier(), "Label limit reached");
                        effective = OTHER_LABEL.to_string();
                    }
                }
            }
            let id = meta.with_label(effective).identifier();
            self.add_to_counter(store, &id, meta.lifetime, amount).await?;
        }
        Ok(())
    }

    /// Counts `error` against `meta`, unless `meta` itself is disabled
    async fn record_error(
        &self,
        meta: &CommonMetricData,
        error: ErrorType,
        count: i32,
    ) -> anyhow::Result<()> {
        if self.stores_for(meta).is_empty() {
            return Ok(());
        }
        let counter = error_metric(meta, error);
        let id = counter.identifier();
        for store in self.stores_for(&counter) {
            self.add_to_counter(&store, &id, counter.lifetime, count).await?;
        }
        debug!(metric = %meta.base_identifier(), error = error.as_str(), "Recorded metric error");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Pings
    // ------------------------------------------------------------------------

    /// Submits `name` and every ping it schedules
    ///
    /// Returns whether a document for `name` itself was queued.
    async fn submit_ping(&self, name: &str, reason: Option<&str>) -> anyhow::Result<bool> {
        let scheduled = {
            let state = self.read_state();
            state
                .pings
                .get(name)
                .map(|ping| ping.schedules_pings.clone())
                .unwrap_or_default()
        };

        let sent = self.collect_and_enqueue(name, reason).await?;
        for other in scheduled.iter().filter(|p| p.as_str() != name) {
            self.collect_and_enqueue(other, reason).await?;
        }
        Ok(sent)
    }

    async fn collect_and_enqueue(&self, name: &str, reason: Option<&str>) -> anyhow::Result<bool> {
        let (ping, ctx, debug_tag, source_tags, log_pings) = {
            let state = self.read_state();
            let Some(ping) = state.pings.get(name).cloned() else {
                error!(ping = name, "Attempted to submit an unknown ping");
                return Ok(false);
            };
            if !state.remote_config.ping_enabled(name, ping.enabled) {
                debug!(ping = name, "Ping is disabled, not submitted");
                return Ok(false);
            }
            if !state.collection_enabled && ping.follows_collection_enabled {
                info!(ping = name, "Collection is disabled, not submitting ping");
                return Ok(false);
            }
            let ctx = AssemblyContext {
                experiments: state.experiments.as_json(),
                experimentation_id: state.experimentation_id.clone(),
                session_start: state.start_time,
            };
            (
                ping,
                ctx,
                state.debug_view_tag.clone(),
                state.source_tags.clone(),
                state.log_pings,
            )
        };

        let Some(doc) = self.assembler.assemble(&ping, reason, &ctx).await? else {
            info!(ping = name, "No content for ping, not submitted");
            return Ok(false);
        };

        let body = serde_json::to_vec(&doc.content)?;
        let mut builder = PingRequest::builder(
            &self.config.language_binding_name,
            self.config.upload.max_ping_body_size,
        )
        .document_id(doc.document_id.as_str())
        .ping_name(name)
        .path(submission_path(&self.config.namespace(), name, &doc.document_id))
        .body(body)
        .body_has_info_sections(doc.has_info_sections);
        if let Some(tag) = &debug_tag {
            builder = builder.header(DEBUG_ID_HEADER, tag.as_str());
        }
        if let Some(tags) = &source_tags {
            builder = builder.header(SOURCE_TAGS_HEADER, tags.header_value());
        }

        let request = match builder.build() {
            Ok(request) => request,
            Err(DomainError::PingBodyOverflow { size, max }) => {
                warn!(ping = name, size, max, "Ping body too large, discarded");
                self.record(
                    &internal_metrics::discarded_exceeding_pings_size(),
                    RecordAction::AddCounter(1),
                )
                .await?;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if log_pings {
            if let Some(pretty) = request.pretty_body() {
                info!(ping = name, document_id = %request.document_id, "{pretty}");
            }
        }

        self.upload.enqueue(&request).await?;
        info!(ping = name, document_id = %request.document_id, reason, "Ping submitted");
        Ok(true)
    }

    async fn submit_metrics_ping(&self, reason: &str) -> anyhow::Result<()> {
        if !self.write_state().metrics_ping.begin() {
            debug!(reason, "Metrics ping submission already running, skipped");
            return Ok(());
        }
        let result = self.submit_ping(METRICS_PING_NAME, Some(reason)).await;
        self.write_state().metrics_ping.finish();
        result?;

        self.write_internal(
            &internal_metrics::last_sent_time(),
            Metric::Datetime(Datetime::now(TimeUnit::Minute)),
        )
        .await
    }

    async fn submit_scheduled_metrics_ping(&self, reason: &str) -> anyhow::Result<()> {
        if !self.write_state().metrics_ping.fire() {
            debug!(reason, "Metrics ping already pending, timer ignored");
            return Ok(());
        }

        let now = local_now();
        let sent_today = match self.last_sent_time().await {
            Ok(last) => last.is_some_and(|t| t.date_naive() == now.date_naive()),
            Err(e) => {
                self.write_state().metrics_ping.finish();
                return Err(e);
            }
        };
        if sent_today {
            debug!(reason, "Metrics ping already sent today, skipped");
            self.write_state().metrics_ping.finish();
            return Ok(());
        }

        self.submit_metrics_ping(reason).await
    }

    async fn last_sent_time(&self) -> anyhow::Result<Option<DateTime<FixedOffset>>> {
        Ok(
            match self
                .store
                .get(INTERNAL_STORAGE, &internal_metrics::last_sent_time().identifier())
                .await?
            {
                Some(Metric::Datetime(d)) => Some(d.value()),
                _ => None,
            },
        )
    }

    // ------------------------------------------------------------------------
    // Collection state
    // ------------------------------------------------------------------------

    async fn set_collection_enabled(&self, enabled: bool) -> anyhow::Result<()> {
        let current = self.read_state().collection_enabled;
        if current == enabled {
            debug!(enabled, "Collection state unchanged");
            return Ok(());
        }

        if enabled {
            self.write_state().collection_enabled = true;
            info!("Collection enabled");
            return self.init_client_info().await;
        }

        // The deletion-request still carries the current client id
        self.submit_ping(DELETION_REQUEST_PING_NAME, Some(REASON_SET_UPLOAD_ENABLED))
            .await?;
        self.write_state().collection_enabled = false;
        self.clear_metrics().await?;
        info!("Collection disabled");
        Ok(())
    }

    /// Drops pending pings and stored data; keeps deletion-requests,
    /// internal bookkeeping and the first run date
    async fn clear_metrics(&self) -> anyhow::Result<()> {
        let dropped = self
            .upload
            .clear_pending_except(DELETION_REQUEST_PING_NAME)
            .await?;

        let first_run_date = internal_metrics::first_run_date();
        let first_run = self
            .store
            .get(CLIENT_INFO_STORAGE, &first_run_date.identifier())
            .await?;

        self.store.clear_all(&[INTERNAL_STORAGE]).await?;

        if let Some(value) = first_run {
            self.write_internal(&first_run_date, value).await?;
        }
        self.write_client_id(KNOWN_CLIENT_ID).await?;

        info!(dropped_pings = dropped, "Cleared stored metrics");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Client info
    // ------------------------------------------------------------------------

    async fn stored_client_id(&self) -> anyhow::Result<Option<String>> {
        Ok(
            match self
                .store
                .get(CLIENT_INFO_STORAGE, &internal_metrics::client_id().identifier())
                .await?
            {
                Some(Metric::Uuid(id)) => Some(id),
                _ => None,
            },
        )
    }

    async fn write_client_id(&self, id: &str) -> anyhow::Result<()> {
        self.write_internal(&internal_metrics::client_id(), Metric::Uuid(id.to_string()))
            .await
    }

    async fn init_client_info(&self) -> anyhow::Result<()> {
        match self.stored_client_id().await? {
            Some(id) if id != KNOWN_CLIENT_ID => {}
            _ => {
                let id = uuid::Uuid::new_v4().to_string();
                debug!(client_id = %id, "Generated client id");
                self.write_client_id(&id).await?;
            }
        }

        let first_run_date = internal_metrics::first_run_date();
        if self
            .store
            .get(CLIENT_INFO_STORAGE, &first_run_date.identifier())
            .await?
            .is_none()
        {
            self.write_internal(&first_run_date, Metric::Datetime(Datetime::now(TimeUnit::Day)))
                .await?;
        }

        let strings = [
            (internal_metrics::os(), self.system.os.clone()),
            (internal_metrics::os_version(), self.system.os_version.clone()),
            (internal_metrics::architecture(), self.system.architecture.clone()),
            (internal_metrics::app_build(), self.config.app_build.clone()),
            (
                internal_metrics::app_display_version(),
                self.config.app_display_version.clone(),
            ),
            (
                internal_metrics::telemetry_sdk_build(),
                env!("CARGO_PKG_VERSION").to_string(),
            ),
        ];
        for (meta, value) in strings {
            self.write_internal(&meta, Metric::String(value)).await?;
        }
        if let Some(channel) = &self.config.channel {
            self.write_internal(&internal_metrics::app_channel(), Metric::String(channel.clone()))
                .await?;
        }
        Ok(())
    }

    /// Writes an SDK-owned value, bypassing the collection checks
    async fn write_internal(&self, meta: &CommonMetricData, value: Metric) -> anyhow::Result<()> {
        self.write(&meta.send_in_pings, &meta.identifier(), meta.lifetime, value)
            .await
    }
}

#[async_trait::async_trait]
impl TaskHandler<Operation> for GleanCore {
    async fn handle(&self, op: Operation) {
        let name = op.name();
        if let Err(e) = self.apply(op).await {
            error!(operation = name, error = %e, "Operation failed");
        }
    }
}
