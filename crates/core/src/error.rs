//! Unified error type for the pipeline crates.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the event pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The queue backend rejected or failed an operation.
    #[error("queue error: {0}")]
    Queue(String),

    /// The lease store rejected or failed an operation.
    #[error("lease error: {0}")]
    Lease(String),

    /// The storage layer rejected or failed an operation.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid event type: {0}")]
    InvalidEventType(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn lease(msg: impl Into<String>) -> Self {
        Self::Lease(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Serialization(_)
            | Self::InvalidEventType(_)
            | Self::MissingField(_)
            | Self::Validation(_) => 400,
            Self::Queue(_) | Self::Lease(_) | Self::Storage(_) | Self::Internal(_) => 500,
        }
    }
}
