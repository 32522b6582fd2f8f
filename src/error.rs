//! Error types
//!
//! Only configuration problems and sink failures are errors. Anything that goes
//! wrong during a single lookup is recorded as a [`crate::LookupOutcome`] instead.

use thiserror::Error;

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading a configuration or domains file
    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A field is missing, empty or malformed
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable override could not be applied
    #[error("Environment variable error: {0}")]
    EnvError(String),

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientError(#[from] reqwest::Error),
}

/// Errors that stop a run before any worker is dispatched.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("concurrency must be at least 1, a pool of zero workers would never finish")]
    ZeroConcurrency,
}

/// Errors raised by report sinks.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The metrics database answered the write with a non-success status
    #[error("write rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
