use chrono::{DateTime, FixedOffset};

use glean_core::domain::datetime::local_now;
use glean_core::domain::{CommonMetricData, Datetime, ErrorType, Metric, TimeUnit};

use crate::operation::{Operation, RecordAction};
use crate::Glean;

/// A point in time at a fixed resolution
///
/// The offset in effect when the value is set is kept, so reading it back
/// in another timezone yields the same string.
#[derive(Clone)]
pub struct DatetimeMetric {
    meta: CommonMetricData,
    time_unit: TimeUnit,
    glean: Glean,
}

impl DatetimeMetric {
    pub fn new(glean: &Glean, meta: CommonMetricData, time_unit: TimeUnit) -> Self {
        Self {
            meta,
            time_unit,
            glean: glean.clone(),
        }
    }

    /// Sets `value`, or the current local time if `None`
    pub fn set(&self, value: Option<DateTime<FixedOffset>>) {
        let value = Datetime::new(value.unwrap_or_else(local_now), self.time_unit);
        self.glean.launch(Operation::Record {
            meta: self.meta.clone(),
            action: RecordAction::SetDatetime(value),
        });
    }

    pub async fn test_get_value(&self, ping: Option<&str>) -> Option<Datetime> {
        match self.glean.test_get_metric(&self.meta, ping).await {
            Some(Metric::Datetime(v)) => Some(v),
            _ => None,
        }
    }

    /// The value as it appears in a ping
    pub async fn test_get_value_as_string(&self, ping: Option<&str>) -> Option<String> {
        self.test_get_value(ping)
            .await
            .map(|v| v.to_formatted_string())
    }

    pub async fn test_get_num_recorded_errors(&self, error: ErrorType) -> i32 {
        self.glean
            .test_get_num_recorded_errors(&self.meta, error, None)
            .await
    }
}
