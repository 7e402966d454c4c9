//! Configuration module for the Glean SDK.
//!
//! Provides typed configuration structs that map to an optional YAML file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration handed to `Glean::initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Root directory for the metric database and pending pings.
    pub data_path: PathBuf,
    /// Application identifier; sanitized into the upload namespace.
    pub application_id: String,
    /// Initial collection-enabled state.
    pub upload_enabled: bool,
    /// Base URL of the collection endpoint.
    pub server_endpoint: String,
    /// Release channel reported in `client_info`.
    pub channel: Option<String>,
    /// Build identifier; a change triggers an `upgrade` metrics ping.
    pub app_build: String,
    pub app_display_version: String,
    /// Experimentation identifier recorded at init.
    pub experimentation_id: Option<String>,
    /// Only the main process may initialize the core.
    pub is_main_process: bool,
    /// Name of the language binding, reported in `X-Telemetry-Agent`.
    pub language_binding_name: String,
    pub dispatcher: DispatcherConfig,
    pub upload: UploadConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// Pre-init task queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum number of tasks buffered before initialization.
    pub max_queue_size: usize,
}

/// Upload retry and request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Attempts allowed for a ping failing recoverably before it is dropped.
    pub max_recoverable_failures: u32,
    /// Backoff after the first recoverable failure (milliseconds).
    pub base_backoff_ms: u64,
    /// Upper bound of the exponential backoff (milliseconds).
    pub max_backoff_ms: u64,
    /// Serialized ping bodies above this size (bytes) are discarded.
    pub max_ping_body_size: usize,
    /// HTTP request timeout (seconds).
    pub request_timeout_secs: u64,
    /// Maximum time `shutdown` waits for the upload queue (seconds).
    pub shutdown_timeout_secs: u64,
}

/// Metrics ping schedule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Local hour (0-23) at which the daily "metrics" ping becomes due.
    pub metrics_ping_hour: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON formatted log lines.
    pub json: bool,
    /// Log the body of every assembled ping.
    pub log_pings: bool,
}

// ---------------------------------------------------------------------------
// Configuration::load()
// ---------------------------------------------------------------------------

impl Configuration {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Configuration = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Configuration::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Upload namespace derived from the application id.
    ///
    /// Lowercased, with `.` and `_` replaced by `-`.
    pub fn namespace(&self) -> String {
        self.application_id
            .chars()
            .map(|c| match c {
                '.' | '_' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for Configuration {
    fn default() -> Self {
        Self {
            data_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("glean"),
            application_id: "glean-app".to_string(),
            upload_enabled: true,
            server_endpoint: "https://incoming.telemetry.mozilla.org".to_string(),
            channel: None,
            app_build: "unknown".to_string(),
            app_display_version: "unknown".to_string(),
            experimentation_id: None,
            is_main_process: true,
            language_binding_name: "Rust".to_string(),
            dispatcher: DispatcherConfig::default(),
            upload: UploadConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_recoverable_failures: 3,
            base_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            max_ping_body_size: 1024 * 1024,
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            metrics_ping_hour: 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_pings: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"upload.max_backoff_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Configuration {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.data_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "data_path".into(),
                message: "must not be empty".into(),
            });
        }
        if self.application_id.trim().is_empty() {
            errors.push(ValidationError {
                field: "application_id".into(),
                message: "must not be empty".into(),
            });
        }

        // --- dispatcher ---
        if self.dispatcher.max_queue_size == 0 {
            errors.push(ValidationError {
                field: "dispatcher.max_queue_size".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- upload ---
        if self.upload.max_recoverable_failures == 0 {
            errors.push(ValidationError {
                field: "upload.max_recoverable_failures".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.upload.base_backoff_ms > self.upload.max_backoff_ms {
            errors.push(ValidationError {
                field: "upload.base_backoff_ms".into(),
                message: format!(
                    "base_backoff_ms ({}) must not exceed max_backoff_ms ({})",
                    self.upload.base_backoff_ms, self.upload.max_backoff_ms
                ),
            });
        }
        if self.upload.max_ping_body_size == 0 {
            errors.push(ValidationError {
                field: "upload.max_ping_body_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.upload.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "upload.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- scheduler ---
        if self.scheduler.metrics_ping_hour > 23 {
            errors.push(ValidationError {
                field: "scheduler.metrics_ping_hour".into(),
                message: "must be in range 0..=23".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigurationBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Configuration`] programmatically.
///
/// Starts from [`Configuration::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use glean_core::config::ConfigurationBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigurationBuilder::new()
///     .data_path(PathBuf::from("/tmp/glean"))
///     .application_id("org.example.app")
///     .upload_enabled(true)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    config: Configuration,
}

impl ConfigurationBuilder {
    /// Create a new builder initialised with [`Configuration::default`] values.
    pub fn new() -> Self {
        Self {
            config: Configuration::default(),
        }
    }

    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_path = path.into();
        self
    }

    pub fn application_id(mut self, id: impl Into<String>) -> Self {
        self.config.application_id = id.into();
        self
    }

    pub fn upload_enabled(mut self, enabled: bool) -> Self {
        self.config.upload_enabled = enabled;
        self
    }

    pub fn server_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.server_endpoint = endpoint.into();
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.config.channel = Some(channel.into());
        self
    }

    pub fn app_build(mut self, build: impl Into<String>) -> Self {
        self.config.app_build = build.into();
        self
    }

    pub fn app_display_version(mut self, version: impl Into<String>) -> Self {
        self.config.app_display_version = version.into();
        self
    }

    pub fn experimentation_id(mut self, id: impl Into<String>) -> Self {
        self.config.experimentation_id = Some(id.into());
        self
    }

    pub fn is_main_process(mut self, main: bool) -> Self {
        self.config.is_main_process = main;
        self
    }

    pub fn language_binding_name(mut self, name: impl Into<String>) -> Self {
        self.config.language_binding_name = name.into();
        self
    }

    // --- dispatcher ---

    pub fn max_queue_size(mut self, n: usize) -> Self {
        self.config.dispatcher.max_queue_size = n;
        self
    }

    // --- upload ---

    pub fn max_recoverable_failures(mut self, n: u32) -> Self {
        self.config.upload.max_recoverable_failures = n;
        self
    }

    pub fn backoff_ms(mut self, base: u64, max: u64) -> Self {
        self.config.upload.base_backoff_ms = base;
        self.config.upload.max_backoff_ms = max;
        self
    }

    pub fn max_ping_body_size(mut self, bytes: usize) -> Self {
        self.config.upload.max_ping_body_size = bytes;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload.request_timeout_secs = secs;
        self
    }

    pub fn shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload.shutdown_timeout_secs = secs;
        self
    }

    // --- scheduler ---

    pub fn metrics_ping_hour(mut self, hour: u32) -> Self {
        self.config.scheduler.metrics_ping_hour = hour;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    pub fn log_pings(mut self, log_pings: bool) -> Self {
        self.config.logging.log_pings = log_pings;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Configuration`].
    pub fn build(self) -> Configuration {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Configuration, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
