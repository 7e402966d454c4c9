use tracing::warn;

use glean_core::domain::{CommonMetricData, ErrorType, Metric};

use super::{launch_error, truncate_chars, MAX_STRING_LENGTH};
use crate::operation::{Operation, RecordAction};
use crate::Glean;

/// A short free-form string
#[derive(Clone)]
pub struct StringMetric {
    meta: CommonMetricData,
    glean: Glean,
}

impl StringMetric {
    pub fn new(glean: &Glean, meta: CommonMetricData) -> Self {
        Self {
            meta,
            glean: glean.clone(),
        }
    }

    /// Sets the value, truncated to [`MAX_STRING_LENGTH`] characters
    pub fn set(&self, value: impl Into<String>) {
        let value = value.into();
        let (value, truncated) = truncate_chars(&value, MAX_STRING_LENGTH);
        if truncated {
            warn!(metric = %self.meta.identifier(), "String value truncated");
            launch_error(&self.glean, &self.meta, ErrorType::InvalidOverflow);
        }
        self.glean.launch(Operation::Record {
            meta: self.meta.clone(),
            action: RecordAction::SetString(value),
        });
    }

    pub async fn test_get_value(&self, ping: Option<&str>) -> Option<String> {
        match self.glean.test_get_metric(&self.meta, ping).await {
            Some(Metric::String(v)) => Some(v),
            _ => None,
        }
    }

    pub async fn test_get_num_recorded_errors(&self, error: ErrorType) -> i32 {
        self.glean
            .test_get_num_recorded_errors(&self.meta, error, None)
            .await
    }
}
