//! Glean Core - Domain model and port definitions
//!
//! This crate contains the I/O free part of the telemetry SDK:
//! - **Domain types** - `CommonMetricData`, `Metric`, `Datetime`, `PingType`,
//!   `PingRequest`, experiments, remote configuration and upload tags
//! - **Port definitions** - Traits for adapters: `IMetricStore`,
//!   `IPendingPingStore`, `IPingUploader`
//! - **Configuration** - YAML backed `Configuration` with validation and a builder
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! Storage lives in `glean-store`, HTTP upload in `glean-net`, and the
//! dispatcher, ping lifecycle and scheduler in `glean`.

pub mod config;
pub mod domain;
pub mod ports;
