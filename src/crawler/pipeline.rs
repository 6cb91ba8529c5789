//! Crawl pipeline: listing → items → details → records → stats
//!
//! # Flow
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────┐   ┌────────────┐
//! │ Fetch    │──▶│ Extract   │──▶│ Fetch+extract│──▶│ Build    │──▶│ Aggregate  │
//! │ listing  │   │ listing   │   │ each detail  │   │ records  │   │ stats      │
//! └──────────┘   └───────────┘   └──────────────┘   └──────────┘   └────────────┘
//!      │               │          bounded, ordered
//!      └───────────────┴──▶ ListingUnavailable
//! ```
//!
//! A run never fails. It ends in [`TerminalState::Done`] or
//! [`TerminalState::ListingUnavailable`], and always returns the state trace,
//! the records built and their statistics. Each run owns its own record set.
//!
//! # Example
//!
//! ```no_run
//! use newsdrift::crawler::fetcher::{FetcherSettings, NewsFetcher};
//! use newsdrift::crawler::pipeline::{CrawlPipeline, PipelineConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> newsdrift::Result<()> {
//! let fetcher = Arc::new(NewsFetcher::new(FetcherSettings::default())?);
//! let pipeline = CrawlPipeline::new(PipelineConfig::default(), fetcher);
//!
//! let run = pipeline.run().await;
//! println!("{} records, {} skipped", run.records.len(), run.summary.skipped);
//! # Ok(())
//! # }
//! ```

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::analytics::{AggregateStats, Aggregator};
use crate::crawler::events::{CrawlEvent, Diagnostics};
use crate::crawler::fetcher::NewsFetcher;
use crate::crawler::record::RecordBuilder;
use crate::metrics;
use crate::models::{DetailFetchStatus, ExtractedDetail, FetchOutcome, ListingItem, NewsRecord};
use crate::parser::{Extractor, RuleSet};
use crate::utils::error::FetchError;
use crate::utils::retry::RetryConfig;

// ============================================================================
// Configuration
// ============================================================================

/// Sina news front page
pub const DEFAULT_LISTING_URL: &str = "https://news.sina.com.cn/";

pub const DEFAULT_CATEGORY: &str = "新浪新闻";

/// Inputs of one run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub listing_url: String,

    /// Category stamped on every record of the run
    pub category: String,

    /// Upper bound on valid items taken from the listing, in listing order
    pub max_items: Option<usize>,

    /// Retry ceiling and backoff for listing and detail fetches
    pub retry: RetryConfig,

    /// Detail fetches in flight at once; 1 is fully sequential
    pub detail_concurrency: usize,

    /// When false, records are built from the listing alone
    pub fetch_details: bool,

    /// Deadline for the whole run; outstanding fetches are aborted when it passes
    pub run_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            max_items: None,
            retry: RetryConfig::default(),
            detail_concurrency: 1,
            fetch_details: true,
            run_timeout: None,
        }
    }
}

// ============================================================================
// Run States and Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    FetchingListing,
    ExtractingListing,
    FetchingDetail,
    ExtractingDetail,
    Building,
    Aggregating,
    Done,
    ListingUnavailable,
}

/// Why the listing stage was unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ListingFailure {
    /// The listing page could not be fetched (or the run deadline passed)
    FetchFailed { attempts: u32 },
    /// The page was fetched but no listing rule matched
    StructureNotFound,
}

impl ListingFailure {
    /// Diagnostic code reported for this failure
    pub fn code(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } => "listing_fetch_failed",
            Self::StructureNotFound => "listing_structure_not_found",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TerminalState {
    Done,
    ListingUnavailable { failure: ListingFailure },
}

impl TerminalState {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn listing_failure(&self) -> Option<ListingFailure> {
        match self {
            Self::Done => None,
            Self::ListingUnavailable { failure } => Some(*failure),
        }
    }
}

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Rows extracted from the listing page
    pub listed: usize,

    /// Rows rejected by validation
    pub skipped: usize,

    pub detail_succeeded: usize,
    pub detail_failed: usize,
    pub detail_skipped: usize,
}

impl RunSummary {
    fn record_detail(&mut self, status: DetailFetchStatus) {
        match status {
            DetailFetchStatus::Success => self.detail_succeeded += 1,
            DetailFetchStatus::Failed => self.detail_failed += 1,
            DetailFetchStatus::Skipped => self.detail_skipped += 1,
        }
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRun {
    pub terminal: TerminalState,

    /// Ordered state trace, `Idle` first and the terminal state last
    pub states: Vec<RunState>,

    /// Records in listing order
    pub records: Vec<NewsRecord>,

    pub stats: AggregateStats,

    pub summary: RunSummary,
}

// ============================================================================
// Pipeline Implementation
// ============================================================================

pub struct CrawlPipeline {
    config: PipelineConfig,
    fetcher: Arc<NewsFetcher>,
    extractor: Extractor,
    rules: RuleSet,
    builder: RecordBuilder,
    aggregator: Aggregator,
    diagnostics: Diagnostics,
}

impl CrawlPipeline {
    /// Create a pipeline with the built-in rules and default aggregation
    pub fn new(config: PipelineConfig, fetcher: Arc<NewsFetcher>) -> Self {
        let builder = RecordBuilder::new(config.category.clone());
        Self {
            config,
            fetcher,
            extractor: Extractor::new(),
            rules: RuleSet::default(),
            builder,
            aggregator: Aggregator::default(),
            diagnostics: Diagnostics::new(),
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Attach a diagnostics dispatcher for pipeline-level events
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run
    pub async fn run(&self) -> CrawlRun {
        let _timer = metrics::start_run_timer(&self.config.category);
        // A timeout past the clock's range means no deadline
        let deadline = self
            .config
            .run_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let mut states = vec![RunState::Idle, RunState::FetchingListing];

        tracing::info!(
            url = %self.config.listing_url,
            category = %self.config.category,
            max_items = ?self.config.max_items,
            detail_concurrency = self.config.detail_concurrency,
            "Starting crawl run"
        );

        let outcome = self.fetch_before(&self.config.listing_url, deadline).await;
        let attempts = outcome.attempts();
        let body = match outcome.into_result() {
            Ok(body) => body,
            Err(_) => {
                return self.unavailable(
                    states,
                    ListingFailure::FetchFailed { attempts },
                    RunSummary::default(),
                )
            }
        };

        states.push(RunState::ExtractingListing);
        let Some(listing) = self.extractor.extract_listing(&body, &self.rules.listing) else {
            self.diagnostics.emit(CrawlEvent::ListingStructureNotFound {
                url: self.config.listing_url.clone(),
            });
            return self.unavailable(
                states,
                ListingFailure::StructureNotFound,
                RunSummary::default(),
            );
        };
        drop(body);

        tracing::debug!(
            rule = %listing.rule,
            rule_index = listing.rule_index,
            entries = listing.entries.len(),
            "Listing extracted"
        );

        let mut summary = RunSummary {
            listed: listing.entries.len(),
            ..Default::default()
        };

        let mut items = Vec::with_capacity(listing.entries.len());
        for entry in listing.entries {
            let item = ListingItem::new(entry.title, entry.href.unwrap_or_default());
            match self.builder.validate(&item) {
                Ok(()) => items.push(item),
                Err(rejection) => {
                    summary.skipped += 1;
                    metrics::record_item_skipped(&self.config.category, rejection.code());
                    self.diagnostics.emit(CrawlEvent::ItemRejected {
                        title: item.title,
                        url: item.url,
                        reason: rejection.code().to_string(),
                    });
                }
            }
        }

        if let Some(max_items) = self.config.max_items {
            items.truncate(max_items);
        }

        // `buffered` yields in input order whatever the completion order
        let details: Vec<(Option<ExtractedDetail>, DetailFetchStatus)> = stream::iter(&items)
            .map(|item| self.resolve_detail(item, deadline))
            .buffered(self.config.detail_concurrency.max(1))
            .collect()
            .await;

        let mut records = Vec::with_capacity(items.len());
        for (item, (detail, status)) in items.iter().zip(details) {
            if status != DetailFetchStatus::Skipped {
                states.extend([RunState::FetchingDetail, RunState::ExtractingDetail]);
            }
            states.push(RunState::Building);

            summary.record_detail(status);
            if let Some(record) = self.builder.build(item, detail, status) {
                records.push(record);
            }
        }

        metrics::record_records_built(&self.config.category, "success", summary.detail_succeeded as u64);
        metrics::record_records_built(&self.config.category, "failed", summary.detail_failed as u64);
        metrics::record_records_built(&self.config.category, "skipped", summary.detail_skipped as u64);

        states.push(RunState::Aggregating);
        let stats = self.aggregator.aggregate(&records);
        states.push(RunState::Done);

        tracing::info!(
            records = records.len(),
            listed = summary.listed,
            skipped = summary.skipped,
            detail_succeeded = summary.detail_succeeded,
            detail_failed = summary.detail_failed,
            "Crawl run completed"
        );

        CrawlRun {
            terminal: TerminalState::Done,
            states,
            records,
            stats,
            summary,
        }
    }

    /// Fetch and extract one detail page; failures stay local to the item
    async fn resolve_detail(
        &self,
        item: &ListingItem,
        deadline: Option<Instant>,
    ) -> (Option<ExtractedDetail>, DetailFetchStatus) {
        if !self.config.fetch_details {
            return (None, DetailFetchStatus::Skipped);
        }

        let outcome = self.fetch_before(&item.url, deadline).await;
        let attempts = outcome.attempts();

        match outcome.into_result() {
            Ok(body) => {
                let detail = self.extractor.extract_detail(&body, &self.rules.detail);
                if detail.is_empty() {
                    self.diagnostics.emit(CrawlEvent::DetailStructureNotFound {
                        url: item.url.clone(),
                    });
                }
                (Some(detail), DetailFetchStatus::Success)
            }
            Err(error) => {
                self.diagnostics.emit(CrawlEvent::DetailFetchFailed {
                    url: item.url.clone(),
                    attempts,
                    error: error.to_string(),
                });
                (None, DetailFetchStatus::Failed)
            }
        }
    }

    /// Fetch with the run's retry settings, aborting at the run deadline
    async fn fetch_before(&self, url: &str, deadline: Option<Instant>) -> FetchOutcome {
        let fetch = self.fetcher.fetch_with(
            url,
            self.config.retry.max_attempts(),
            &self.config.retry.backoff,
        );

        let Some(deadline) = deadline else {
            return fetch.await;
        };

        match tokio::time::timeout_at(deadline, fetch).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(url = %url, "Fetch aborted by run deadline");
                FetchOutcome::failed(url, 1, FetchError::Aborted)
            }
        }
    }

    fn unavailable(
        &self,
        mut states: Vec<RunState>,
        failure: ListingFailure,
        summary: RunSummary,
    ) -> CrawlRun {
        states.push(RunState::ListingUnavailable);
        metrics::record_listing_unavailable(failure.code());
        self.diagnostics.emit(CrawlEvent::ListingUnavailable {
            url: self.config.listing_url.clone(),
            code: failure.code().to_string(),
        });

        CrawlRun {
            terminal: TerminalState::ListingUnavailable { failure },
            states,
            records: Vec::new(),
            stats: self.aggregator.aggregate(&[]),
            summary,
        }
    }
}
