//! Error types for dynamic synonym filters.
//!
//! All fallible operations return [`SynonymError`]. The variants map onto the
//! recovery policy of the reload subsystem: configuration errors are fatal at
//! construction, fetch errors are swallowed by a reload tick, and build errors
//! are fatal only for the synchronous first build of a non-lenient filter.
//!
//! # Examples
//!
//! ```
//! use dynamic_synonym::error::{Result, SynonymError};
//!
//! fn require_path(path: Option<&str>) -> Result<&str> {
//!     path.ok_or_else(|| SynonymError::config("`synonyms_path` is required"))
//! }
//!
//! assert!(require_path(None).is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for dynamic synonym operations.
#[derive(Error, Debug)]
pub enum SynonymError {
    /// I/O errors (reading a local synonym file, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid or missing filter configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The synonym source could not be retrieved
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Malformed synonym rules
    #[error("Build error: {0}")]
    Build(String),

    /// Analysis-related errors (tokenization, filtering, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Background worker errors
    #[error("Worker error: {0}")]
    Worker(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with SynonymError.
pub type Result<T> = std::result::Result<T, SynonymError>;

impl SynonymError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SynonymError::Config(msg.into())
    }

    /// Create a new fetch error.
    pub fn fetch<S: Into<String>>(msg: S) -> Self {
        SynonymError::Fetch(msg.into())
    }

    /// Create a new build error.
    pub fn build<S: Into<String>>(msg: S) -> Self {
        SynonymError::Build(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        SynonymError::Analysis(msg.into())
    }

    /// Create a new worker error.
    pub fn worker<S: Into<String>>(msg: S) -> Self {
        SynonymError::Worker(msg.into())
    }
}
