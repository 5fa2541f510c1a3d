//! Error types for bdaysync.

use thiserror::Error;

/// Errors that can occur while syncing birthdays.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport failure talking to either remote service.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A malformed contact record or birthday value.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Template error: {0}")]
    TemplateRender(String),

    /// Create, replace or lookup against the calendar failed.
    #[error("Calendar error: {0}")]
    Sink(String),

    #[error("Invalid schedule expression '{expr}': {reason}")]
    InvalidSchedule { expr: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}

/// Result type alias for bdaysync operations.
pub type SyncResult<T> = Result<T, SyncError>;
