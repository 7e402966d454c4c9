use tracing::warn;

use glean_core::domain::{CommonMetricData, ErrorType, Metric};

use super::{launch_error, truncate_chars, MAX_STRING_LENGTH};
use crate::operation::{Operation, RecordAction};
use crate::Glean;

/// Most items a list keeps
pub const MAX_LIST_LENGTH: usize = 100;

/// An ordered list of short strings
#[derive(Clone)]
pub struct StringListMetric {
    meta: CommonMetricData,
    glean: Glean,
}

impl StringListMetric {
    pub fn new(glean: &Glean, meta: CommonMetricData) -> Self {
        Self {
            meta,
            glean: glean.clone(),
        }
    }

    /// Appends one item
    ///
    /// Appending to a full list is an `invalid_overflow` error.
    pub fn add(&self, value: impl Into<String>) {
        let value = self.truncate_item(&value.into());
        self.glean.launch(Operation::Record {
            meta: self.meta.clone(),
            action: RecordAction::AppendString(value),
        });
    }

    /// Replaces the list, keeping at most [`MAX_LIST_LENGTH`] items
    pub fn set(&self, values: Vec<String>) {
        if values.len() > MAX_LIST_LENGTH {
            warn!(
                metric = %self.meta.identifier(),
                len = values.len(),
                "String list too long, extra items dropped"
            );
            launch_error(&self.glean, &self.meta, ErrorType::InvalidOverflow);
        }
        let values = values
            .iter()
            .take(MAX_LIST_LENGTH)
            .map(|v| self.truncate_item(v))
            .collect();
        self.glean.launch(Operation::Record {
            meta: self.meta.clone(),
            action: RecordAction::SetStringList(values),
        });
    }

    fn truncate_item(&self, value: &str) -> String {
        let (value, truncated) = truncate_chars(value, MAX_STRING_LENGTH);
        if truncated {
            warn!(metric = %self.meta.identifier(), "String list item truncated");
            launch_error(&self.glean, &self.meta, ErrorType::InvalidOverflow);
        }
        value
    }

    pub async fn test_get_value(&self, ping: Option<&str>) -> Option<Vec<String>> {
        match self.glean.test_get_metric(&self.meta, ping).await {
            Some(Metric::StringList(v)) => Some(v),
            _ => None,
        }
    }

    pub async fn test_get_num_recorded_errors(&self, error: ErrorType) -> i32 {
        self.glean
            .test_get_num_recorded_errors(&self.meta, error, None)
            .await
    }
}
