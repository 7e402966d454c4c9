//! Error counters
//!
//! A validation failure on metric `m` increments the labeled counter
//! `glean.error.<error_type>` under the label `m`'s identifier, in every
//! ping `m` is sent in plus the metrics ping.

use glean_core::domain::metric::{CommonMetricData, ErrorType, Lifetime, Metric};
use glean_core::domain::ping::METRICS_PING_NAME;
use glean_core::ports::IMetricStore;

/// The labeled-counter entry counting `error` for `meta`
pub fn error_metric(meta: &CommonMetricData, error: ErrorType) -> CommonMetricData {
    let mut send_in_pings = meta.send_in_pings.clone();
    if !send_in_pings.iter().any(|p| p == METRICS_PING_NAME) {
        send_in_pings.push(METRICS_PING_NAME.to_string());
    }

    CommonMetricData {
        category: "glean.error".to_string(),
        name: error.as_str().to_string(),
        send_in_pings,
        lifetime: Lifetime::Ping,
        disabled: false,
        dynamic_label: Some(meta.base_identifier()),
    }
}

/// Number of `error`s recorded for `meta` in `ping` (default: its first ping)
pub async fn num_recorded_errors(
    store: &dyn IMetricStore,
    meta: &CommonMetricData,
    error: ErrorType,
    ping: Option<&str>,
) -> i32 {
    let Some(ping) = ping.or_else(|| meta.default_store()) else {
        return 0;
    };
    let id = error_metric(meta, error).identifier();
    match store.get(ping, &id).await {
        Ok(Some(Metric::Counter(n))) => n,
        _ => 0,
    }
}
