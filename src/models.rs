// Core data structures for the newsdrift crawler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::error::FetchError;

/// Terminal status of one fetch attempt sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    Failed,
}

/// Result of fetching one URL, retries included.
///
/// `body` is present exactly when the status is [`FetchStatus::Success`];
/// `error` exactly when it is [`FetchStatus::Failed`].
#[derive(Debug)]
pub struct FetchOutcome {
    url: String,
    attempts: u32,
    body: Option<String>,
    error: Option<FetchError>,
}

impl FetchOutcome {
    pub fn success(url: impl Into<String>, attempts: u32, body: String) -> Self {
        Self {
            url: url.into(),
            attempts: attempts.max(1),
            body: Some(body),
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, attempts: u32, error: FetchError) -> Self {
        Self {
            url: url.into(),
            attempts: attempts.max(1),
            body: None,
            error: Some(error),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> FetchStatus {
        if self.body.is_some() {
            FetchStatus::Success
        } else {
            FetchStatus::Failed
        }
    }

    pub fn is_success(&self) -> bool {
        self.body.is_some()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Last error seen when the fetch failed
    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    /// Consume the outcome, yielding the body on success or the error on failure
    pub fn into_result(self) -> Result<String, FetchError> {
        match (self.body, self.error) {
            (Some(body), _) => Ok(body),
            (None, Some(error)) => Err(error),
            (None, None) => Err(FetchError::Aborted),
        }
    }
}

/// A row discovered on the listing page, before its detail page is fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingItem {
    pub title: String,
    pub url: String,
    pub discovered_at: DateTime<Utc>,
}

impl ListingItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            discovered_at: Utc::now(),
        }
    }
}

/// Optional fields resolved from one detail page, each independently
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDetail {
    pub content: Option<String>,
    pub publish_time: Option<String>,
    pub author: Option<String>,
}

impl ExtractedDetail {
    /// True when no field could be resolved
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.publish_time.is_none() && self.author.is_none()
    }
}

/// Outcome of the detail step for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailFetchStatus {
    Success,
    Failed,
    Skipped,
}

impl DetailFetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for DetailFetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of output: one validated listing item plus whatever detail was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub title: String,
    pub url: String,
    pub discovered_at: DateTime<Utc>,
    pub category: String,
    pub publish_time: Option<String>,
    pub author: Option<String>,
    pub content: Option<String>,
    pub detail_fetch_status: DetailFetchStatus,
}
