//! `Retry-After` header parsing

use std::time::Duration;

use tracing::warn;

/// Longest delay a server may request
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Parses a `Retry-After` header value
///
/// Accepts delay-seconds or an HTTP-date. Delays are capped at one hour;
/// dates in the past yield zero. Returns `None` for unparseable values.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        let secs = (target - now).num_seconds().max(0) as u64;
        return Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER));
    }

    warn!(value, "Could not parse Retry-After header");
    None
}
