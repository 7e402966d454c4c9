//! Error types returned to the host application
//!
//! Only `initialize` surfaces errors; every other public call degrades to
//! logging and dropping.

use thiserror::Error;

/// Errors that prevent the core from becoming operational
#[derive(Debug, Error)]
pub enum GleanError {
    /// The data path is empty or the database cannot be opened in it
    #[error("Invalid data path: {0}")]
    InvalidDataPath(String),

    /// The configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Initialization was attempted from a secondary process
    #[error("Glean can only be initialized in the main process")]
    NotMainProcess,

    /// Client info or scheduler bookkeeping could not be set up
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// The HTTP uploader could not be built
    #[error("Uploader error: {0}")]
    Uploader(String),
}
