// src/error.rs

//! Unified error handling for the ingestion pipeline and query service.

use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias for application operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Delimited table could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// A spawned task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The search backend rejected or failed an operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend is unreachable or the index does not exist
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a backend error.
    pub fn backend(message: impl fmt::Display) -> Self {
        Self::Backend(message.to_string())
    }

    /// Create a search-unavailable error.
    pub fn unavailable(message: impl fmt::Display) -> Self {
        Self::SearchUnavailable(message.to_string())
    }

    /// True when the failure means the search service cannot answer at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::SearchUnavailable(_))
    }
}

impl From<BackendError> for AppError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::IndexNotFound(_)
            | BackendError::Transient(_)
            | BackendError::Throttled(_) => {
                Self::SearchUnavailable(error.to_string())
            }
            other => Self::Backend(other.to_string()),
        }
    }
}
