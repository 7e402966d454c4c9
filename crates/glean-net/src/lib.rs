//! Glean Net - HTTP transport for assembled pings
//!
//! Implements the `IPingUploader` port from `glean-core` on top of
//! `reqwest`. The uploader makes exactly one attempt per call and reports
//! the outcome; retry policy belongs to the upload manager.

pub mod client;
pub mod retry_after;

pub use client::HttpUploader;
pub use retry_after::parse_retry_after;
