//! Ping type definitions
//!
//! A [`PingType`] describes how a ping is assembled: which info sections it
//! carries, whether it is sent empty, which reasons it accepts and which
//! other pings it drags along when submitted.

use serde::{Deserialize, Serialize};

/// Name of the built-in daily metrics ping
pub const METRICS_PING_NAME: &str = "metrics";
/// Name of the built-in deletion-request ping
pub const DELETION_REQUEST_PING_NAME: &str = "deletion-request";

/// Reserved store holding the `client_info` section
pub const CLIENT_INFO_STORAGE: &str = "glean_client_info";
/// Reserved store for bookkeeping (sequence numbers, ping start times, scheduler)
pub const INTERNAL_STORAGE: &str = "glean_internal_info";

/// Canary client id stored while collection is disabled
pub const KNOWN_CLIENT_ID: &str = "c0ffeec0-ffee-c0ff-eec0-ffeec0ffeec0";

/// A registered ping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingType {
    pub name: String,
    pub include_client_id: bool,
    pub send_if_empty: bool,
    pub precise_timestamps: bool,
    pub include_info_sections: bool,
    /// Compiled-in enabled flag; remote configuration may override it
    pub enabled: bool,
    /// Pings submitted together with this one
    pub schedules_pings: Vec<String>,
    pub reason_codes: Vec<String>,
    /// When false, the ping is sent (and its metrics recorded) even with
    /// collection disabled
    pub follows_collection_enabled: bool,
}

impl PingType {
    /// A custom ping with default attributes: client id and info sections
    /// included, not sent empty, follows collection state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            include_client_id: true,
            send_if_empty: false,
            precise_timestamps: true,
            include_info_sections: true,
            enabled: true,
            schedules_pings: Vec::new(),
            reason_codes: Vec::new(),
            follows_collection_enabled: true,
        }
    }

    pub fn with_include_client_id(mut self, include: bool) -> Self {
        self.include_client_id = include;
        self
    }

    pub fn with_send_if_empty(mut self, send: bool) -> Self {
        self.send_if_empty = send;
        self
    }

    pub fn with_precise_timestamps(mut self, precise: bool) -> Self {
        self.precise_timestamps = precise;
        self
    }

    pub fn with_include_info_sections(mut self, include: bool) -> Self {
        self.include_info_sections = include;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_schedules_pings(mut self, pings: &[&str]) -> Self {
        self.schedules_pings = pings.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_reason_codes(mut self, reasons: &[&str]) -> Self {
        self.reason_codes = reasons.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_follows_collection_enabled(mut self, follows: bool) -> Self {
        self.follows_collection_enabled = follows;
        self
    }

    /// Whether `reason` may be reported in `ping_info`
    pub fn accepts_reason(&self, reason: &str) -> bool {
        self.reason_codes.iter().any(|r| r == reason)
    }

    /// The built-in daily metrics ping
    pub fn metrics() -> Self {
        Self::new(METRICS_PING_NAME)
            .with_precise_timestamps(false)
            .with_reason_codes(&["overdue", "reschedule", "today", "tomorrow", "upgrade"])
    }

    /// The built-in deletion-request ping
    pub fn deletion_request() -> Self {
        Self::new(DELETION_REQUEST_PING_NAME)
            .with_send_if_empty(true)
            .with_reason_codes(&["at_init", "set_upload_enabled"])
            .with_follows_collection_enabled(false)
    }
}
