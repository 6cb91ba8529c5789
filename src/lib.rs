//! newsdrift - drift-tolerant news listing crawler
//!
//! Fetches a listing page and its linked detail pages from a site whose
//! markup changes over time, extracts records through ordered fallback
//! rules, and summarizes them.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Fetcher with bounded retry, record builder and pipeline
//! - [`parser`] - Fallback-chain HTML extraction
//! - [`analytics`] - Aggregate statistics over records
//! - [`models`] - Core data structures and types
//! - [`metrics`] - Prometheus counters
//! - [`utils`] - Retry policies, domain errors and helpers
//!
//! # Example
//!
//! ```no_run
//! use newsdrift::config::Config;
//! use newsdrift::crawler::{CrawlPipeline, NewsFetcher};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!
//!     let fetcher = Arc::new(NewsFetcher::new(config.fetcher_settings())?);
//!     let pipeline = CrawlPipeline::new(config.pipeline_config(), fetcher);
//!
//!     let run = pipeline.run().await;
//!     println!("{}", serde_json::to_string_pretty(&run.stats)?);
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod config;
pub mod crawler;
pub mod error;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analytics::{aggregate, AggregateStats, Aggregator};
    pub use crate::config::Config;
    pub use crate::crawler::{
        CrawlEvent, CrawlPipeline, CrawlRun, Diagnostics, NewsFetcher, PipelineConfig,
        TerminalState,
    };
    pub use crate::error::{Error, ErrorCategory, NewsdriftErrorTrait, Result};
    pub use crate::models::{DetailFetchStatus, FetchOutcome, ListingItem, NewsRecord};
    pub use crate::parser::{ExtractionRule, Extractor, RuleSet};
}

// Direct re-exports for convenience
pub use error::{Error, Result};
pub use models::{DetailFetchStatus, FetchOutcome, NewsRecord};
