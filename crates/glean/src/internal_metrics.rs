//! Metrics the SDK records about itself
//!
//! Client info lives in [`CLIENT_INFO_STORAGE`], bookkeeping in
//! [`INTERNAL_STORAGE`]; neither is reported as a regular metric.

use glean_core::domain::metric::{CommonMetricData, Lifetime};
use glean_core::domain::ping::{CLIENT_INFO_STORAGE, INTERNAL_STORAGE, METRICS_PING_NAME};

fn client_info(name: &str, lifetime: Lifetime) -> CommonMetricData {
    CommonMetricData::new("", name, &[CLIENT_INFO_STORAGE]).with_lifetime(lifetime)
}

fn internal(category: &str, name: &str) -> CommonMetricData {
    CommonMetricData::new(category, name, &[INTERNAL_STORAGE]).with_lifetime(Lifetime::User)
}

// --- client_info ---

pub fn client_id() -> CommonMetricData {
    client_info("client_id", Lifetime::User)
}

pub fn first_run_date() -> CommonMetricData {
    client_info("first_run_date", Lifetime::User)
}

pub fn os() -> CommonMetricData {
    client_info("os", Lifetime::Application)
}

pub fn os_version() -> CommonMetricData {
    client_info("os_version", Lifetime::Application)
}

pub fn architecture() -> CommonMetricData {
    client_info("architecture", Lifetime::Application)
}

pub fn app_build() -> CommonMetricData {
    client_info("app_build", Lifetime::Application)
}

pub fn app_display_version() -> CommonMetricData {
    client_info("app_display_version", Lifetime::Application)
}

pub fn app_channel() -> CommonMetricData {
    client_info("app_channel", Lifetime::Application)
}

pub fn telemetry_sdk_build() -> CommonMetricData {
    client_info("telemetry_sdk_build", Lifetime::Application)
}

// --- bookkeeping ---

/// When the metrics ping was last submitted
pub fn last_sent_time() -> CommonMetricData {
    internal("mps", "last_sent_time")
}

/// App build at the last metrics ping submission
pub fn last_sent_build() -> CommonMetricData {
    internal("mps", "last_sent_build")
}

/// Next `seq` of a ping
pub fn sequence_number(ping: &str) -> CommonMetricData {
    internal("", &format!("{ping}#sequence"))
}

/// End time of the previous document of a ping
pub fn ping_start_time(ping: &str) -> CommonMetricData {
    internal("", &format!("{ping}#start"))
}

// --- health ---

/// Tasks dropped from the pre-init queue
pub fn preinit_tasks_overflow() -> CommonMetricData {
    CommonMetricData::new("glean.error", "preinit_tasks_overflow", &[METRICS_PING_NAME])
}

/// Uploads dropped, labeled `recoverable` / `unrecoverable`
pub fn ping_upload_failure() -> CommonMetricData {
    CommonMetricData::new("glean.upload", "ping_upload_failure", &[METRICS_PING_NAME])
}

/// Pings discarded because their body was too large
pub fn discarded_exceeding_pings_size() -> CommonMetricData {
    CommonMetricData::new(
        "glean.upload",
        "discarded_exceeding_pings_size",
        &[METRICS_PING_NAME],
    )
}
