//! Diagnostic events emitted during a crawl
//!
//! Every event is written to `tracing`. When an [`EventSink`] is attached
//! the same event is also handed to it, so callers can observe retries,
//! rejections and structural misses without scraping logs.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::utils::truncate_text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    /// An attempt failed and another one is about to start
    RetryScheduled {
        url: String,
        attempt: u32,
        error: String,
    },
    /// All attempts for a URL failed
    FetchFailed {
        url: String,
        attempts: u32,
        error: String,
    },
    /// The run ended without a usable listing page
    ListingUnavailable { url: String, code: String },
    /// The listing page was fetched but no listing rule matched
    ListingStructureNotFound { url: String },
    /// A listing row failed validation and was skipped
    ItemRejected {
        title: String,
        url: String,
        reason: String,
    },
    /// The detail page of a valid item could not be fetched
    DetailFetchFailed {
        url: String,
        attempts: u32,
        error: String,
    },
    /// The detail page was fetched but no detail rule matched
    DetailStructureNotFound { url: String },
}

impl CrawlEvent {
    /// Stable name of the event kind, matching the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::ListingUnavailable { .. } => "listing_unavailable",
            Self::ListingStructureNotFound { .. } => "listing_structure_not_found",
            Self::ItemRejected { .. } => "item_rejected",
            Self::DetailFetchFailed { .. } => "detail_fetch_failed",
            Self::DetailStructureNotFound { .. } => "detail_structure_not_found",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::RetryScheduled { url, .. }
            | Self::FetchFailed { url, .. }
            | Self::ListingUnavailable { url, .. }
            | Self::ListingStructureNotFound { url }
            | Self::ItemRejected { url, .. }
            | Self::DetailFetchFailed { url, .. }
            | Self::DetailStructureNotFound { url } => url,
        }
    }
}

/// Receiver of crawl events
///
/// Implementations must not block; `emit` is called from inside the crawl.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CrawlEvent);
}

/// Sink that forwards events into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<CrawlEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CrawlEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: CrawlEvent) {
        // A dropped receiver only means nobody is listening anymore
        let _ = self.sender.send(event);
    }
}

/// Event dispatcher shared by the fetcher and the pipeline
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl Diagnostics {
    /// Dispatcher that only logs
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher that logs and forwards to `sink`
    pub fn with_sink(sink: Arc<dyn EventSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn emit(&self, event: CrawlEvent) {
        log_event(&event);
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }
}

fn log_event(event: &CrawlEvent) {
    match event {
        CrawlEvent::RetryScheduled { url, attempt, error } => {
            tracing::warn!(url = %url, attempt, error = %error, "Fetch failed, retrying");
        }
        CrawlEvent::FetchFailed { url, attempts, error } => {
            tracing::warn!(url = %url, attempts, error = %error, "Fetch failed after all attempts");
        }
        CrawlEvent::ListingUnavailable { url, code } => {
            tracing::error!(url = %url, code = %code, "Listing unavailable");
        }
        CrawlEvent::ListingStructureNotFound { url } => {
            tracing::warn!(url = %url, "No listing rule matched");
        }
        CrawlEvent::ItemRejected { title, url, reason } => {
            tracing::debug!(
                title = %truncate_text(title, 40),
                url = %url,
                reason = %reason,
                "Listing item skipped"
            );
        }
        CrawlEvent::DetailFetchFailed { url, attempts, error } => {
            tracing::warn!(url = %url, attempts, error = %error, "Detail fetch failed");
        }
        CrawlEvent::DetailStructureNotFound { url } => {
            tracing::info!(url = %url, "No detail rule matched");
        }
    }
}
