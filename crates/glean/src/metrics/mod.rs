//! Typed metric handles
//!
//! A handle validates its input on the calling thread, then launches an
//! [`Operation`](crate::operation::Operation). Invalid input is never stored;
//! it is counted under `glean.error.*` instead.
//!
//! Every handle has `test_get_value`, which waits for earlier calls to be
//! applied and reads the stored value of the given ping (default: the first
//! of `send_in_pings`).

mod boolean;
mod counter;
mod datetime;
pub mod labeled_counter;
mod ping;
mod quantity;
mod string;
pub mod string_list;
mod uuid;

pub use boolean::BooleanMetric;
pub use counter::CounterMetric;
pub use datetime::DatetimeMetric;
pub use labeled_counter::{LabeledCounter, LabeledCounterMetric};
pub use ping::PingHandle;
pub use quantity::QuantityMetric;
pub use string::StringMetric;
pub use string_list::StringListMetric;
pub use uuid::UuidMetric;

use glean_core::domain::{CommonMetricData, ErrorType};

use crate::operation::Operation;
use crate::Glean;

/// Longest string value, in characters
pub const MAX_STRING_LENGTH: usize = 100;

/// Cuts `value` to `max` characters; the flag says whether it was cut
pub(crate) fn truncate_chars(value: &str, max: usize) -> (String, bool) {
    match value.char_indices().nth(max) {
        Some((end, _)) => (value[..end].to_string(), true),
        None => (value.to_string(), false),
    }
}

/// Counts one `error` against `meta`
pub(crate) fn launch_error(glean: &Glean, meta: &CommonMetricData, error: ErrorType) {
    glean.launch(Operation::RecordError {
        meta: meta.clone(),
        error,
        count: 1,
    });
}
