//! Domain error types
//!
//! Validation failures for user-supplied values (tags, configuration
//! payloads, datetimes) and for assembled upload requests.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Debug view tag does not match the identifier pattern
    #[error("Invalid debug view tag: {0}")]
    InvalidDebugTag(String),

    /// Source tag list is empty, too long, or has an invalid member
    #[error("Invalid source tags: {0}")]
    InvalidSourceTags(String),

    /// Datetime string could not be parsed
    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    /// Remote configuration payload is not valid JSON of the expected shape
    #[error("Invalid remote configuration: {0}")]
    InvalidRemoteConfig(String),

    /// Serialized ping body exceeds the configured limit
    #[error("Ping body of {size} bytes exceeds the limit of {max} bytes")]
    PingBodyOverflow {
        /// Actual body size in bytes
        size: usize,
        /// Configured maximum in bytes
        max: usize,
    },

    /// A request was built without a required field
    #[error("Incomplete ping request: missing {0}")]
    IncompleteRequest(&'static str),
}
