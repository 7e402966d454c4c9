use tracing::warn;

use glean_core::domain::{CommonMetricData, ErrorType, Metric};

use super::launch_error;
use crate::operation::{Operation, RecordAction};
use crate::Glean;

/// A non-negative scalar
#[derive(Clone)]
pub struct QuantityMetric {
    meta: CommonMetricData,
    glean: Glean,
}

impl QuantityMetric {
    pub fn new(glean: &Glean, meta: CommonMetricData) -> Self {
        Self {
            meta,
            glean: glean.clone(),
        }
    }

    pub fn set(&self, value: i64) {
        if value < 0 {
            warn!(metric = %self.meta.identifier(), value, "Quantity cannot be negative");
            launch_error(&self.glean, &self.meta, ErrorType::InvalidValue);
            return;
        }
        self.glean.launch(Operation::Record {
            meta: self.meta.clone(),
            action: RecordAction::SetQuantity(value),
        });
    }

    pub async fn test_get_value(&self, ping: Option<&str>) -> Option<i64> {
        match self.glean.test_get_metric(&self.meta, ping).await {
            Some(Metric::Quantity(v)) => Some(v),
            _ => None,
        }
    }

    pub async fn test_get_num_recorded_errors(&self, error: ErrorType) -> i32 {
        self.glean
            .test_get_num_recorded_errors(&self.meta, error, None)
            .await
    }
}
