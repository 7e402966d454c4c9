//! Client-side telemetry SDK
//!
//! [`Glean`] is the entry point. Every public call becomes an
//! [`Operation`](operation::Operation) on the [`Dispatcher`](dispatcher::Dispatcher):
//! buffered before [`Glean::initialize`], replayed in order afterwards, and
//! applied one at a time by the core.
//!
//! ```text
//! Glean / metric handles ──→ Dispatcher ──→ GleanCore ──→ SqliteMetricStore
//!                                              │
//!                                              └─→ PingAssembler ──→ UploadManager ──→ IPingUploader
//! ```
//!
//! The SDK only emits `tracing` events and never installs a subscriber on
//! its own.
//!
//! Only `initialize` reports errors to the host. Everything else is
//! validated locally and otherwise logged and dropped.

pub mod assembler;
pub mod core;
pub mod dispatcher;
pub mod error;
pub mod error_recording;
pub mod internal_metrics;
pub mod logging;
pub mod metrics;
pub mod operation;
pub mod scheduler;
pub mod system;
pub mod upload;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use glean_core::config::{Configuration, DispatcherConfig};
use glean_core::domain::{
    CommonMetricData, DebugTag, ErrorType, Metric, PingRequest, PingType, RecordedExperiment,
    RemoteConfig, SourceTags,
};
use glean_core::ports::{IMetricStore, IPingUploader};
use glean_net::HttpUploader;
use glean_store::{DatabasePool, SqliteMetricStore};

use crate::core::{CoreState, GleanCore, SharedState};
use crate::dispatcher::Dispatcher;
use crate::operation::{Launcher, Operation};
use crate::scheduler::MetricsPingScheduler;
use crate::system::SystemInfo;
use crate::upload::{UploadManager, UploadPolicy};

pub use crate::error::GleanError;
pub use glean_core::config;
pub use glean_core::domain;

// ============================================================================
// Glean
// ============================================================================

/// Resources that exist only while initialized
struct Running {
    config: Arc<Configuration>,
    pool: DatabasePool,
    store: Arc<SqliteMetricStore>,
    upload: Arc<UploadManager>,
    upload_stop: CancellationToken,
    upload_drain: CancellationToken,
    upload_worker: JoinHandle<()>,
    scheduler: MetricsPingScheduler,
}

struct Inner {
    dispatcher: Dispatcher<Operation>,
    state: SharedState,
    /// Every ping registered on this handle; outlives resets
    registered_pings: RwLock<BTreeMap<String, PingType>>,
    running: Mutex<Option<Running>>,
    initialized: AtomicBool,
}

/// Handle to one SDK instance
///
/// Cheap to clone; clones share the same instance.
#[derive(Clone)]
pub struct Glean {
    inner: Arc<Inner>,
}

impl Default for Glean {
    fn default() -> Self {
        Self::new()
    }
}

impl Glean {
    /// Creates an uninitialized instance that buffers calls
    pub fn new() -> Self {
        Self::with_dispatcher_config(DispatcherConfig::default())
    }

    /// Creates an uninitialized instance with a custom pre-init queue bound
    pub fn with_dispatcher_config(config: DispatcherConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatcher: Dispatcher::new(config.max_queue_size),
                state: SharedState::default(),
                registered_pings: RwLock::new(BTreeMap::new()),
                running: Mutex::new(None),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Opens storage, starts the workers and replays buffered calls
    ///
    /// Calling it again on an initialized instance is ignored.
    ///
    /// # Errors
    ///
    /// - `GleanError::NotMainProcess` if `config.is_main_process` is false
    /// - `GleanError::InvalidDataPath` for an empty or unusable data path
    /// - `GleanError::InvalidConfiguration` if validation fails
    /// - `GleanError::Initialization` if the stored client info or the
    ///   scheduler bookkeeping cannot be set up
    ///
    /// On error the instance stays uninitialized and keeps buffering.
    /// Logging is left to the host; see [`logging::init_logging`].
    pub async fn initialize(
        &self,
        config: Configuration,
        uploader: Arc<dyn IPingUploader>,
    ) -> Result<(), GleanError> {
        let mut running = self.inner.running.lock().await;
        if running.is_some() {
            warn!("Glean is already initialized, ignoring");
            return Ok(());
        }

        if !config.is_main_process {
            warn!("Not the main process, Glean stays uninitialized");
            return Err(GleanError::NotMainProcess);
        }
        if config.data_path.as_os_str().is_empty() {
            return Err(GleanError::InvalidDataPath("data path is empty".into()));
        }
        let errors = config.validate();
        if !errors.is_empty() {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GleanError::InvalidConfiguration(message));
        }

        let config = Arc::new(config);
        let pool = DatabasePool::open_in(&config.data_path)
            .await
            .map_err(|e| {
                GleanError::InvalidDataPath(format!("{}: {e}", config.data_path.display()))
            })?;
        let store = Arc::new(SqliteMetricStore::new(pool.pool().clone()));

        let launcher = self.launcher();
        let upload = Arc::new(UploadManager::new(
            store.clone(),
            uploader,
            UploadPolicy::from(&config.upload),
            launcher.clone(),
        ));
        let core = Arc::new(GleanCore::new(
            config.clone(),
            self.inner.state.clone(),
            store.clone(),
            upload.clone(),
            SystemInfo::collect(),
        ));

        self.restore_registered_pings();
        let setup = async {
            core.initialize().await?;
            core.schedule_metrics_ping().await
        };
        let first_boundary = match setup.await {
            Ok(when) => when,
            Err(e) => {
                pool.close().await;
                return Err(GleanError::Initialization(e.to_string()));
            }
        };

        let upload_stop = CancellationToken::new();
        let upload_drain = CancellationToken::new();
        let upload_worker = tokio::spawn(
            upload
                .clone()
                .run(upload_stop.clone(), upload_drain.clone()),
        );
        let scheduler = MetricsPingScheduler::start(
            first_boundary,
            config.scheduler.metrics_ping_hour,
            launcher,
        );

        self.inner.dispatcher.start(core);
        let overflowed = self.inner.dispatcher.flush_queued_initial_tasks();
        if overflowed > 0 {
            warn!(overflowed, "Pre-init queue overflowed, oldest calls were dropped");
            self.launch(Operation::RecordPreinitOverflow(overflowed));
        }

        *running = Some(Running {
            config: config.clone(),
            pool,
            store,
            upload,
            upload_stop,
            upload_drain,
            upload_worker,
            scheduler,
        });
        self.inner.initialized.store(true, Ordering::SeqCst);

        info!(
            application_id = %config.application_id,
            data_path = %config.data_path.display(),
            upload_enabled = config.upload_enabled,
            "Glean initialized"
        );
        Ok(())
    }

    /// Initializes with the reqwest uploader pointed at `server_endpoint`
    ///
    /// # Errors
    ///
    /// As [`Glean::initialize`], plus `GleanError::Uploader` if the HTTP
    /// client cannot be built.
    pub async fn initialize_with_http_uploader(
        &self,
        config: Configuration,
    ) -> Result<(), GleanError> {
        let uploader = HttpUploader::new(
            &config.server_endpoint,
            Duration::from_secs(config.upload.request_timeout_secs),
        )
        .map_err(|e| GleanError::Uploader(e.to_string()))?;
        self.initialize(config, Arc::new(uploader)).await
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Launches background reports through the dispatcher without keeping
    /// the instance alive
    fn launcher(&self) -> Launcher {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |op| {
            if let Some(inner) = inner.upgrade() {
                inner.dispatcher.launch(op);
            }
        })
    }

    pub(crate) fn launch(&self, op: Operation) {
        debug!(operation = op.name(), "Launching");
        self.inner.dispatcher.launch(op);
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CoreState> {
        self.inner.state.read().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    /// Turns collection on or off
    ///
    /// Turning it off submits one deletion-request ping before anything
    /// launched afterwards is applied.
    pub fn set_collection_enabled(&self, enabled: bool) {
        self.launch(Operation::SetCollectionEnabled(enabled));
    }

    /// Makes a custom ping known to the core
    ///
    /// The registration is kept across [`Glean::test_destroy_glean`] and
    /// applied again by the next [`Glean::initialize`].
    pub fn register_ping_type(&self, ping: PingType) {
        self.inner
            .registered_pings
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(ping.name.clone(), ping.clone());
        self.launch(Operation::RegisterPing(ping));
    }

    fn restore_registered_pings(&self) {
        let registered = self
            .inner
            .registered_pings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
        for (name, ping) in registered {
            state.pings.insert(name, ping);
        }
    }

    /// Collects and uploads the named ping
    ///
    /// Unknown pings are logged; disabled pings are ignored.
    pub fn submit_ping_by_name(&self, name: &str, reason: Option<&str>) {
        self.launch(Operation::SubmitPing {
            name: name.to_string(),
            reason: reason.map(str::to_string),
        });
    }

    pub fn set_experiment_active(
        &self,
        id: &str,
        branch: &str,
        extra: Option<BTreeMap<String, String>>,
    ) {
        self.launch(Operation::SetExperimentActive {
            id: id.to_string(),
            branch: branch.to_string(),
            extra,
        });
    }

    pub fn set_experiment_inactive(&self, id: &str) {
        self.launch(Operation::SetExperimentInactive { id: id.to_string() });
    }

    /// Applies a remote configuration payload
    ///
    /// Returns `false` and changes nothing if `json` cannot be parsed.
    pub fn apply_server_knobs_config(&self, json: &str) -> bool {
        match RemoteConfig::from_json(json) {
            Ok(config) => {
                self.launch(Operation::ApplyServerKnobs(config));
                true
            }
            Err(e) => {
                warn!(error = %e, "Rejected remote configuration");
                false
            }
        }
    }

    /// Tags every following ping with `X-Debug-ID`
    ///
    /// Returns `false` and keeps the previous tag if `tag` is invalid.
    pub fn set_debug_view_tag(&self, tag: &str) -> bool {
        match DebugTag::new(tag.to_string()) {
            Ok(tag) => {
                self.launch(Operation::SetDebugViewTag(tag));
                true
            }
            Err(e) => {
                warn!(error = %e, "Rejected debug view tag");
                false
            }
        }
    }

    /// Tags every following ping with `X-Source-Tags`
    ///
    /// Returns `false` and keeps the previous tags if any tag is invalid.
    pub fn set_source_tags(&self, tags: Vec<String>) -> bool {
        match SourceTags::new(tags) {
            Ok(tags) => {
                self.launch(Operation::SetSourceTags(tags));
                true
            }
            Err(e) => {
                warn!(error = %e, "Rejected source tags");
                false
            }
        }
    }

    /// Logs every assembled ping body
    pub fn set_log_pings(&self, enabled: bool) {
        self.launch(Operation::SetLogPings(enabled));
    }

    /// Waits for every call made so far to be applied
    ///
    /// Returns immediately before initialization.
    pub async fn block_on_dispatcher(&self) {
        self.inner.dispatcher.block_on_queue().await;
    }

    /// Applies outstanding calls, uploads what is pending and releases storage
    ///
    /// Uploads get at most `upload.shutdown_timeout_secs`; whatever remains
    /// is retried on the next start. Calls made afterwards are dropped.
    pub async fn shutdown(&self) {
        if !self.is_initialized() {
            debug!("Shutdown requested before initialization");
            return;
        }

        self.inner.dispatcher.shutdown().await;

        let Some(mut running) = self.inner.running.lock().await.take() else {
            return;
        };
        running.scheduler.stop().await;

        running.upload_drain.cancel();
        let timeout = Duration::from_secs(running.config.upload.shutdown_timeout_secs);
        if tokio::time::timeout(timeout, &mut running.upload_worker)
            .await
            .is_err()
        {
            warn!(
                timeout_secs = timeout.as_secs(),
                "Pending uploads did not finish before shutdown"
            );
            running.upload_stop.cancel();
            let _ = running.upload_worker.await;
        }

        running.pool.close().await;
        self.inner.initialized.store(false, Ordering::SeqCst);
        info!("Glean shut down");
    }

    // ------------------------------------------------------------------------
    // Test support
    // ------------------------------------------------------------------------

    /// Stops everything and returns to pre-init buffering
    ///
    /// Queued calls are discarded; a call being applied completes. With
    /// `clear_stores` every stored metric and pending ping is deleted,
    /// otherwise pending pings are retried after the next initialization.
    pub async fn test_destroy_glean(&self, clear_stores: bool) {
        self.inner.dispatcher.reset().await;

        if let Some(running) = self.inner.running.lock().await.take() {
            running.scheduler.stop().await;
            running.upload_stop.cancel();
            let _ = running.upload_worker.await;
            if clear_stores {
                if let Err(e) = running.store.wipe().await {
                    warn!(error = %e, "Failed to wipe stores");
                }
            }
            running.pool.close().await;
        }

        *self.inner.state.write().unwrap_or_else(|e| e.into_inner()) = CoreState::default();
        self.inner.initialized.store(false, Ordering::SeqCst);
        debug!(clear_stores, "Glean destroyed");
    }

    /// Dispatches what the metrics ping timer dispatches when it fires
    pub fn test_fire_metrics_ping_timer(&self, reason: &str) {
        self.launch(Operation::SubmitScheduledMetricsPing {
            reason: reason.to_string(),
        });
    }

    pub async fn test_is_experiment_active(&self, id: &str) -> bool {
        self.block_on_dispatcher().await;
        self.read_state().experiments.is_active(id)
    }

    pub async fn test_get_experiment_data(&self, id: &str) -> Option<RecordedExperiment> {
        self.block_on_dispatcher().await;
        self.read_state().experiments.get(id).cloned()
    }

    pub async fn test_get_experimentation_id(&self) -> Option<String> {
        self.block_on_dispatcher().await;
        self.read_state().experimentation_id.clone()
    }

    /// Requests still waiting for upload, oldest first
    pub async fn test_get_pending_pings(&self) -> Vec<PingRequest> {
        self.block_on_dispatcher().await;
        let upload = match self.inner.running.lock().await.as_ref() {
            Some(running) => running.upload.clone(),
            None => return Vec::new(),
        };
        match upload.list_pending().await {
            Ok(pending) => pending.into_iter().map(|p| p.request).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list pending pings");
                Vec::new()
            }
        }
    }

    /// The store, once every earlier call has been applied
    async fn test_storage(&self) -> Option<Arc<dyn IMetricStore>> {
        self.block_on_dispatcher().await;
        self.inner
            .running
            .lock()
            .await
            .as_ref()
            .map(|running| running.store.clone() as Arc<dyn IMetricStore>)
    }

    pub(crate) async fn test_get_metric(
        &self,
        meta: &CommonMetricData,
        ping: Option<&str>,
    ) -> Option<Metric> {
        let store = self.test_storage().await?;
        let ping = ping.or_else(|| meta.default_store())?;
        store.get(ping, &meta.identifier()).await.ok().flatten()
    }

    pub(crate) async fn test_get_num_recorded_errors(
        &self,
        meta: &CommonMetricData,
        error: ErrorType,
        ping: Option<&str>,
    ) -> i32 {
        match self.test_storage().await {
            Some(store) => {
                error_recording::num_recorded_errors(store.as_ref(), meta, error, ping).await
            }
            None => 0,
        }
    }
}
