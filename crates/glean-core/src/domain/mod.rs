//! Domain types for the telemetry SDK
//!
//! Everything in here is pure data and validation; no storage, no network.

pub mod datetime;
pub mod errors;
pub mod experiment;
pub mod metric;
pub mod ping;
pub mod remote_config;
pub mod request;
pub mod tags;

pub use datetime::{Datetime, TimeUnit};
pub use errors::DomainError;
pub use experiment::{ExperimentRegistry, RecordedExperiment};
pub use metric::{CommonMetricData, ErrorType, Lifetime, Metric};
pub use ping::PingType;
pub use remote_config::RemoteConfig;
pub use request::{PingRequest, PingRequestBuilder};
pub use tags::{DebugTag, SourceTags};
