//! Fetching and crawl orchestration
//!
//! The fetcher talks to the network, the record builder validates and
//! assembles records, and the pipeline drives one listing page and its
//! detail pages through both.

pub mod events;
pub mod fetcher;
pub mod headers;
pub mod pipeline;
pub mod record;
pub mod url;

pub use events::{ChannelSink, CrawlEvent, Diagnostics, EventSink};
pub use fetcher::{FetcherSettings, NewsFetcher};
pub use pipeline::{
    CrawlPipeline, CrawlRun, ListingFailure, PipelineConfig, RunState, RunSummary, TerminalState,
};
pub use record::RecordBuilder;
