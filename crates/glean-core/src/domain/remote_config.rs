//! Server-driven metric and ping overrides
//!
//! Payload shape:
//!
//! ```json
//! { "metrics_enabled": { "category.name": true }, "pings_enabled": { "custom": false } }
//! ```
//!
//! Overrides change the effective enabled state at runtime without touching
//! the compiled-in defaults. A new payload replaces the previous one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Parsed remote configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub metrics_enabled: HashMap<String, bool>,
    pub pings_enabled: HashMap<String, bool>,
}

impl RemoteConfig {
    /// Parses a JSON payload
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidRemoteConfig` for malformed JSON or a
    /// payload that is not an object of the expected shape.
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        serde_json::from_str(json).map_err(|e| DomainError::InvalidRemoteConfig(e.to_string()))
    }

    /// Effective disabled flag for a metric.
    ///
    /// `identifier` is the unlabeled `category.name`.
    pub fn metric_disabled(&self, identifier: &str, default_disabled: bool) -> bool {
        match self.metrics_enabled.get(identifier) {
            Some(enabled) => !enabled,
            None => default_disabled,
        }
    }

    /// Effective enabled flag for a ping
    pub fn ping_enabled(&self, name: &str, default_enabled: bool) -> bool {
        self.pings_enabled
            .get(name)
            .copied()
            .unwrap_or(default_enabled)
    }
}
