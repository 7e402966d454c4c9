//! Integration tests for the glean crate
//!
//! Each test runs a real instance on a temporary data directory with an
//! in-process uploader that records every request it receives.

mod common;

mod test_dispatch;
mod test_init;
mod test_metrics;
mod test_pings;
mod test_upload;
