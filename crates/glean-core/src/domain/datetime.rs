//! Datetime values with a resolution
//!
//! A [`Datetime`] keeps the offset that was in effect when it was set and
//! is truncated to its [`TimeUnit`] on construction, so reading it back
//! never depends on the timezone of the reader.

use chrono::{DateTime, FixedOffset, Local, Timelike};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Resolution of a datetime value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanosecond,
    Microsecond,
    #[default]
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// chrono format string producing the ping representation
    pub fn format_pattern(&self) -> &'static str {
        match self {
            TimeUnit::Nanosecond => "%Y-%m-%dT%H:%M:%S%.9f%:z",
            TimeUnit::Microsecond => "%Y-%m-%dT%H:%M:%S%.6f%:z",
            TimeUnit::Millisecond => "%Y-%m-%dT%H:%M:%S%.3f%:z",
            TimeUnit::Second => "%Y-%m-%dT%H:%M:%S%:z",
            TimeUnit::Minute => "%Y-%m-%dT%H:%M%:z",
            TimeUnit::Hour => "%Y-%m-%dT%H%:z",
            TimeUnit::Day => "%Y-%m-%d%:z",
        }
    }
}

/// A point in time, its original offset and its resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datetime {
    value: DateTime<FixedOffset>,
    time_unit: TimeUnit,
}

impl Datetime {
    /// Creates a datetime truncated to `time_unit`
    pub fn new(value: DateTime<FixedOffset>, time_unit: TimeUnit) -> Self {
        Self {
            value: truncate(value, time_unit),
            time_unit,
        }
    }

    /// Current local time
    pub fn now(time_unit: TimeUnit) -> Self {
        Self::new(local_now(), time_unit)
    }

    /// Parses an RFC 3339 string (full precision) and truncates it
    pub fn parse_rfc3339(s: &str, time_unit: TimeUnit) -> Result<Self, DomainError> {
        let value = DateTime::parse_from_rfc3339(s)
            .map_err(|e| DomainError::InvalidDatetime(format!("{s}: {e}")))?;
        Ok(Self::new(value, time_unit))
    }

    pub fn value(&self) -> DateTime<FixedOffset> {
        self.value
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    /// String representation at the configured resolution, with the set-time offset
    pub fn to_formatted_string(&self) -> String {
        self.value
            .format(self.time_unit.format_pattern())
            .to_string()
    }
}

impl std::fmt::Display for Datetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_formatted_string())
    }
}

/// Local wall-clock time with its current offset
pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn truncate(value: DateTime<FixedOffset>, unit: TimeUnit) -> DateTime<FixedOffset> {
    let nanos = value.nanosecond();
    let truncated = match unit {
        TimeUnit::Nanosecond => Some(value),
        TimeUnit::Microsecond => value.with_nanosecond(nanos / 1_000 * 1_000),
        TimeUnit::Millisecond => value.with_nanosecond(nanos / 1_000_000 * 1_000_000),
        TimeUnit::Second => value.with_nanosecond(0),
        TimeUnit::Minute => value.with_nanosecond(0).and_then(|v| v.with_second(0)),
        TimeUnit::Hour => value
            .with_nanosecond(0)
            .and_then(|v| v.with_second(0))
            .and_then(|v| v.with_minute(0)),
        TimeUnit::Day => value
            .with_nanosecond(0)
            .and_then(|v| v.with_second(0))
            .and_then(|v| v.with_minute(0))
            .and_then(|v| v.with_hour(0)),
    };
    truncated.unwrap_or(value)
}
