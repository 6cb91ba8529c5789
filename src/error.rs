//! Unified error handling for the newsdrift crate
//!
//! Domain errors live in [`crate::utils::error`]; this module wraps them in a
//! single [`Error`] used at construction boundaries (building a fetcher,
//! compiling rules, loading a record file). A crawl run itself never returns
//! an error: it ends in a terminal state instead.

use std::io;
use thiserror::Error;

pub use crate::utils::error::{ExtractError, FetchError, ValidationRejection};

/// Common interface implemented by newsdrift error types
pub trait NewsdriftErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection failures, timeouts, non-2xx responses
    Network,
    /// Input that can never succeed (bad URL syntax, undecodable body)
    MalformedInput,
    /// Extraction rule problems
    Parsing,
    /// Configuration and validation errors
    Config,
    /// File and serialization errors
    Storage,
    /// Other/unknown errors
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::MalformedInput => "malformed_input",
            Self::Parsing => "parsing",
            Self::Config => "config",
            Self::Storage => "storage",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

impl NewsdriftErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        self.is_retryable()
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrl(_) | Self::Decode(_) => ErrorCategory::MalformedInput,
            Self::Http(_) | Self::ServerError(_) | Self::Timeout | Self::Aborted => {
                ErrorCategory::Network
            }
        }
    }
}

impl NewsdriftErrorTrait for ExtractError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

/// Unified error type for the newsdrift crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Extraction rule errors
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl NewsdriftErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Extract(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Http(_) => true,
            Self::Config(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Extract(e) => e.category(),
            Self::Http(_) => ErrorCategory::Network,
            Self::Io(_) | Self::Json(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
