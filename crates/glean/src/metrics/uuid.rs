use glean_core::domain::{CommonMetricData, ErrorType, Metric};

use crate::operation::{Operation, RecordAction};
use crate::Glean;

/// A UUID
#[derive(Clone)]
pub struct UuidMetric {
    meta: CommonMetricData,
    glean: Glean,
}

impl UuidMetric {
    pub fn new(glean: &Glean, meta: CommonMetricData) -> Self {
        Self {
            meta,
            glean: glean.clone(),
        }
    }

    pub fn set(&self, value: ::uuid::Uuid) {
        self.glean.launch(Operation::Record {
            meta: self.meta.clone(),
            action: RecordAction::SetUuid(value.to_string()),
        });
    }

    /// Sets a fresh random v4 UUID and returns it
    pub fn generate_and_set(&self) -> ::uuid::Uuid {
        let value = ::uuid::Uuid::new_v4();
        self.set(value);
        value
    }

    pub async fn test_get_value(&self, ping: Option<&str>) -> Option<::uuid::Uuid> {
        match self.glean.test_get_metric(&self.meta, ping).await {
            Some(Metric::Uuid(v)) => ::uuid::Uuid::parse_str(&v).ok(),
            _ => None,
        }
    }

    pub async fn test_get_num_recorded_errors(&self, error: ErrorType) -> i32 {
        self.glean
            .test_get_num_recorded_errors(&self.meta, error, None)
            .await
    }
}
