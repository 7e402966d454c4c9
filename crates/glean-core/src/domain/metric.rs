//! Metric identity, lifetimes and stored values
//!
//! The store treats every value as an opaque [`Metric`] payload keyed by
//! `(store, identifier)`; kind specific validation happens in the typed
//! handles before a value ever reaches this module.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use super::datetime::Datetime;

/// Separator between a labeled metric's identifier and its label
pub const LABEL_SEPARATOR: char = '/';

// ============================================================================
// Lifetime
// ============================================================================

/// How long a recorded value survives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// Cleared whenever the ping it belongs to is collected
    #[default]
    Ping,
    /// Survives ping collection; cleared when collection is disabled
    Application,
    /// Survives ping collection and restarts; cleared when collection is disabled
    User,
}

impl Lifetime {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Ping => "ping",
            Lifetime::Application => "application",
            Lifetime::User => "user",
        }
    }

    /// Parses the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ping" => Some(Lifetime::Ping),
            "application" => Some(Lifetime::Application),
            "user" => Some(Lifetime::User),
            _ => None,
        }
    }
}

// ============================================================================
// CommonMetricData
// ============================================================================

/// Identity and routing information shared by every metric kind
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommonMetricData {
    /// Metric category, may be empty
    pub category: String,
    /// Metric name
    pub name: String,
    /// Pings (stores) the value is recorded into; the first is the default
    pub send_in_pings: Vec<String>,
    /// Lifetime of the recorded value
    pub lifetime: Lifetime,
    /// Compiled-in disabled flag; a remote configuration may override it
    pub disabled: bool,
    /// Label for a single entry of a labeled metric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_label: Option<String>,
}

impl CommonMetricData {
    /// Creates metric data with ping lifetime, enabled
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        send_in_pings: &[&str],
    ) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            send_in_pings: send_in_pings.iter().map(|p| p.to_string()).collect(),
            lifetime: Lifetime::Ping,
            disabled: false,
            dynamic_label: None,
        }
    }

    /// Sets the lifetime
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sets the compiled-in disabled flag
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// `category.name`, or just `name` when the category is empty.
    ///
    /// This is the key remote configuration refers to.
    pub fn base_identifier(&self) -> String {
        if self.category.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.category, self.name)
        }
    }

    /// Storage key; labeled entries append `/label`
    pub fn identifier(&self) -> String {
        match &self.dynamic_label {
            Some(label) => format!("{}{}{}", self.base_identifier(), LABEL_SEPARATOR, label),
            None => self.base_identifier(),
        }
    }

    /// The ping used by test getters when none is given
    pub fn default_store(&self) -> Option<&str> {
        self.send_in_pings.first().map(String::as_str)
    }

    /// Copy of this metric addressing a single label
    pub fn with_label(&self, label: impl Into<String>) -> Self {
        let mut data = self.clone();
        data.dynamic_label = Some(label.into());
        data
    }
}

// ============================================================================
// Metric values
// ============================================================================

/// A recorded value of one metric kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Metric {
    Boolean(bool),
    Counter(i32),
    Quantity(i64),
    String(String),
    StringList(Vec<String>),
    Uuid(String),
    Datetime(Datetime),
}

impl Metric {
    /// Name of the section this value is grouped under in a ping payload
    pub fn ping_section(&self) -> &'static str {
        match self {
            Metric::Boolean(_) => "boolean",
            Metric::Counter(_) => "counter",
            Metric::Quantity(_) => "quantity",
            Metric::String(_) => "string",
            Metric::StringList(_) => "string_list",
            Metric::Uuid(_) => "uuid",
            Metric::Datetime(_) => "datetime",
        }
    }

    /// JSON representation as it appears in a ping
    pub fn as_json(&self) -> JsonValue {
        match self {
            Metric::Boolean(b) => json!(b),
            Metric::Counter(c) => json!(c),
            Metric::Quantity(q) => json!(q),
            Metric::String(s) => json!(s),
            Metric::StringList(l) => json!(l),
            Metric::Uuid(u) => json!(u),
            Metric::Datetime(d) => json!(d.to_formatted_string()),
        }
    }
}

// ============================================================================
// Error types
// ============================================================================

/// Kinds of recording errors counted against a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The value failed validation (e.g. a negative counter increment)
    InvalidValue,
    /// A label was too long or contained invalid characters
    InvalidLabel,
    /// The metric was used in an invalid state
    InvalidState,
    /// The value exceeded a size limit and was truncated or dropped
    InvalidOverflow,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::InvalidValue => "invalid_value",
            ErrorType::InvalidLabel => "invalid_label",
            ErrorType::InvalidState => "invalid_state",
            ErrorType::InvalidOverflow => "invalid_overflow",
        }
    }

    /// All error kinds, in reporting order
    pub fn all() -> [ErrorType; 4] {
        [
            ErrorType::InvalidValue,
            ErrorType::InvalidLabel,
            ErrorType::InvalidState,
            ErrorType::InvalidOverflow,
        ]
    }
}
