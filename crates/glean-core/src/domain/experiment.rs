//! Active experiment annotations
//!
//! Experiments are reported in `ping_info.experiments`. Ids, branches and
//! extras are bounded; oversized input is truncated rather than rejected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Maximum length of an experiment id, branch, or extra key/value
pub const MAX_EXPERIMENT_STRING_LENGTH: usize = 100;
/// Maximum number of extra entries kept per experiment
pub const MAX_EXPERIMENT_EXTRAS: usize = 20;

/// Branch and extras of one active experiment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedExperiment {
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<BTreeMap<String, String>>,
}

/// The set of active experiments, keyed by id
#[derive(Debug, Clone, Default)]
pub struct ExperimentRegistry {
    active: BTreeMap<String, RecordedExperiment>,
}

impl ExperimentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an experiment active, replacing any previous record for the id.
    ///
    /// Returns `true` if any input had to be truncated.
    pub fn set_active(
        &mut self,
        id: &str,
        branch: &str,
        extra: Option<BTreeMap<String, String>>,
    ) -> bool {
        let (id, mut truncated) = truncate(id);
        let (branch, branch_truncated) = truncate(branch);
        truncated |= branch_truncated;

        let extra = extra.map(|extra| {
            if extra.len() > MAX_EXPERIMENT_EXTRAS {
                truncated = true;
            }
            extra
                .into_iter()
                .take(MAX_EXPERIMENT_EXTRAS)
                .map(|(k, v)| {
                    let (k, kt) = truncate(&k);
                    let (v, vt) = truncate(&v);
                    truncated |= kt || vt;
                    (k, v)
                })
                .collect()
        });

        self.active.insert(id, RecordedExperiment { branch, extra });
        truncated
    }

    /// Removes an experiment; unknown ids are ignored
    pub fn set_inactive(&mut self, id: &str) {
        let (id, _) = truncate(id);
        self.active.remove(&id);
    }

    pub fn get(&self, id: &str) -> Option<&RecordedExperiment> {
        self.active.get(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    /// `ping_info.experiments` payload, `None` when nothing is active
    pub fn as_json(&self) -> Option<JsonValue> {
        if self.active.is_empty() {
            return None;
        }
        serde_json::to_value(&self.active).ok()
    }
}

fn truncate(value: &str) -> (String, bool) {
    if value.chars().count() > MAX_EXPERIMENT_STRING_LENGTH {
        (
            value.chars().take(MAX_EXPERIMENT_STRING_LENGTH).collect(),
            true,
        )
    } else {
        (value.to_string(), false)
    }
}
