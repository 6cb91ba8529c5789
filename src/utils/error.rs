//! Error types for the newsdrift crawler
//!
//! This module defines the domain-specific error types used below the
//! pipeline level. None of them escape a crawl run: the fetcher folds
//! [`FetchError`] into a failed outcome and the record builder counts
//! [`ValidationRejection`]s instead of raising them.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error (connection refused, reset, body read failure)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response status
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The run deadline passed before the fetch completed
    #[error("Fetch aborted by run deadline")]
    Aborted,
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures and every non-2xx status are retried. Malformed
    /// URLs, undecodable bodies and deadline aborts are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::ServerError(_) | Self::Timeout)
    }

    /// Short machine-readable code used in diagnostics and metrics labels
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::ServerError(_) => "server_error",
            Self::Timeout => "timeout",
            Self::Decode(_) => "decode",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Aborted => "aborted",
        }
    }
}

/// Errors raised while building extraction rules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// A CSS selector in a rule chain failed to parse
    #[error("Invalid selector '{selector}' in rule '{rule}': {message}")]
    InvalidSelector {
        rule: String,
        selector: String,
        message: String,
    },

    /// A rule was declared without any selector steps
    #[error("Rule '{0}' has an empty selector chain")]
    EmptyChain(String),
}

/// Reasons a listing item is refused by the record builder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationRejection {
    /// Title is empty after trimming
    #[error("title is empty")]
    EmptyTitle,

    /// URL is missing or blank
    #[error("url is empty")]
    EmptyUrl,

    /// URL has no scheme/host (e.g. `/news/1.html`)
    #[error("url is not absolute: {0}")]
    RelativeUrl(String),

    /// URL is absolute but not http or https
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    /// URL could not be parsed at all
    #[error("malformed url: {0}")]
    MalformedUrl(String),
}

impl ValidationRejection {
    /// Short machine-readable code used in diagnostics
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyTitle => "empty_title",
            Self::EmptyUrl => "empty_url",
            Self::RelativeUrl(_) => "relative_url",
            Self::UnsupportedScheme(_) => "unsupported_scheme",
            Self::MalformedUrl(_) => "malformed_url",
        }
    }
}
