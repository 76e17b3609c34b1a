//! Error types for the liftgraph_core library.
//!
//! Only failures that make a whole operation's outcome unknown live here.
//! Per-item problems (bad references, schema violations, missing records)
//! are reported as data alongside successful results.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for liftgraph_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A fetch did not finish within its deadline
    #[error("Fetch timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Transport or storage failure reported by the record provider
    #[error("Provider error: {0}")]
    Provider(String),

    /// Caller bug, e.g. exercise resolution handed a template reference
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures where retrying with another strategy may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Provider(_) | Error::Io(_))
    }
}
