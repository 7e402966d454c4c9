use glean_core::domain::{CommonMetricData, ErrorType, Metric};

use crate::operation::{Operation, RecordAction};
use crate::Glean;

/// A flag
#[derive(Clone)]
pub struct BooleanMetric {
    meta: CommonMetricData,
    glean: Glean,
}

impl BooleanMetric {
    pub fn new(glean: &Glean, meta: CommonMetricData) -> Self {
        Self {
            meta,
            glean: glean.clone(),
        }
    }

    pub fn set(&self, value: bool) {
        self.glean.launch(Operation::Record {
            meta: self.meta.clone(),
            action: RecordAction::SetBoolean(value),
        });
    }

    pub async fn test_get_value(&self, ping: Option<&str>) -> Option<bool> {
        match self.glean.test_get_metric(&self.meta, ping).await {
            Some(Metric::Boolean(v)) => Some(v),
            _ => None,
        }
    }

    pub async fn test_get_num_recorded_errors(&self, error: ErrorType) -> i32 {
        self.glean
            .test_get_num_recorded_errors(&self.meta, error, None)
            .await
    }
}
