//! Counters split by label
//!
//! Each label is stored as its own counter under `category.name/label`.
//! Labels outside the static set, invalid dynamic labels, and dynamic labels
//! beyond [`MAX_LABELS`] per ping are counted under [`OTHER_LABEL`].

use std::sync::Arc;

use tracing::warn;

use glean_core::domain::{CommonMetricData, ErrorType, Metric};

use super::launch_error;
use crate::operation::{Operation, RecordAction};
use crate::Glean;

/// Catch-all label
pub const OTHER_LABEL: &str = "__other__";
/// Distinct dynamic labels kept per ping
pub const MAX_LABELS: usize = 16;
/// Longest dynamic label, in characters
pub const MAX_LABEL_LENGTH: usize = 111;

/// Non-empty printable ASCII, at most [`MAX_LABEL_LENGTH`] characters
pub fn is_valid_dynamic_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LENGTH
        && label.chars().all(|c| c.is_ascii_graphic() || c == ' ')
}

/// A family of counters keyed by label
#[derive(Clone)]
pub struct LabeledCounterMetric {
    meta: CommonMetricData,
    labels: Option<Arc<Vec<String>>>,
    glean: Glean,
}

impl LabeledCounterMetric {
    /// # Arguments
    /// * `labels` - Static label set, or `None` to accept dynamic labels
    pub fn new(glean: &Glean, meta: CommonMetricData, labels: Option<Vec<String>>) -> Self {
        Self {
            meta,
            labels: labels.map(Arc::new),
            glean: glean.clone(),
        }
    }

    /// The counter for `label`
    pub fn get(&self, label: &str) -> LabeledCounter {
        LabeledCounter {
            parent: self.clone(),
            label: label.to_string(),
        }
    }

    /// Errors are counted against the labeled metric as a whole
    pub async fn test_get_num_recorded_errors(&self, error: ErrorType) -> i32 {
        self.glean
            .test_get_num_recorded_errors(&self.meta, error, None)
            .await
    }
}

/// One label of a [`LabeledCounterMetric`]
#[derive(Clone)]
pub struct LabeledCounter {
    parent: LabeledCounterMetric,
    label: String,
}

impl LabeledCounter {
    /// Adds `amount`; negative amounts are an `invalid_value` error and zero is ignored
    pub fn add(&self, amount: i32) {
        let meta = &self.parent.meta;
        if amount < 0 {
            warn!(metric = %meta.identifier(), amount, "Counter cannot be decremented");
            launch_error(&self.parent.glean, meta, ErrorType::InvalidValue);
            return;
        }
        if amount == 0 {
            return;
        }
        self.parent.glean.launch(Operation::Record {
            meta: meta.clone(),
            action: RecordAction::AddLabeledCounter {
                label: self.label.clone(),
                amount,
                labels: self.parent.labels.as_deref().cloned(),
            },
        });
    }

    /// Value stored under exactly this label
    pub async fn test_get_value(&self, ping: Option<&str>) -> Option<i32> {
        let meta = self.parent.meta.with_label(self.label.as_str());
        match self.parent.glean.test_get_metric(&meta, ping).await {
            Some(Metric::Counter(v)) => Some(v),
            _ => None,
        }
    }
}
