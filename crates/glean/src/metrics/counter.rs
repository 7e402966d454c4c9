use tracing::warn;

use glean_core::domain::{CommonMetricData, ErrorType, Metric};

use super::launch_error;
use crate::operation::{Operation, RecordAction};
use crate::Glean;

/// A monotonically increasing count
///
/// Saturates at `i32::MAX`.
#[derive(Clone)]
pub struct CounterMetric {
    meta: CommonMetricData,
    glean: Glean,
}

impl CounterMetric {
    pub fn new(glean: &Glean, meta: CommonMetricData) -> Self {
        Self {
            meta,
            glean: glean.clone(),
        }
    }

    /// Adds `amount`; negative amounts are an `invalid_value` error and zero is ignored
    pub fn add(&self, amount: i32) {
        if amount < 0 {
            warn!(metric = %self.meta.identifier(), amount, "Counter cannot be decremented");
            launch_error(&self.glean, &self.meta, ErrorType::InvalidValue);
            return;
        }
        if amount == 0 {
            return;
        }
        self.glean.launch(Operation::Record {
            meta: self.meta.clone(),
            action: RecordAction::AddCounter(amount),
        });
    }

    pub async fn test_get_value(&self, ping: Option<&str>) -> Option<i32> {
        match self.glean.test_get_metric(&self.meta, ping).await {
            Some(Metric::Counter(v)) => Some(v),
            _ => None,
        }
    }

    pub async fn test_get_num_recorded_errors(&self, error: ErrorType) -> i32 {
        self.glean
            .test_get_num_recorded_errors(&self.meta, error, None)
            .await
    }
}
