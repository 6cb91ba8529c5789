//! Configuration management for the newsdrift crawler
//!
//! Configuration is loaded from a TOML file or from `NEWSDRIFT_*`
//! environment variables. Every section has defaults aimed at the Sina
//! news front page, so a file only needs the values it changes.

use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::analytics::Aggregator;
use crate::crawler::fetcher::FetcherSettings;
use crate::crawler::headers::{DEFAULT_ACCEPT_LANGUAGE, DEFAULT_USER_AGENT};
use crate::crawler::pipeline::{PipelineConfig, DEFAULT_CATEGORY, DEFAULT_LISTING_URL};
use crate::crawler::url::validate_absolute_http;
use crate::parser::{RuleConfig, RuleSet};
use crate::utils::retry::{BackoffPolicy, RetryConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,

    pub retry: RetryConfig,

    /// Extraction rule overrides
    pub rules: RuleConfig,

    pub analytics: AnalyticsConfig,

    pub logging: LoggingConfig,
}

/// Crawler-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Listing page to start from
    pub listing_url: String,

    /// Category stamped on every record
    pub category: String,

    /// Maximum number of valid listing items to follow
    pub max_items: Option<usize>,

    /// Rate limit (requests per second)
    pub requests_per_second: u32,

    /// Per-attempt request timeout in seconds
    pub request_timeout_secs: u64,

    pub user_agent: String,

    pub accept_language: String,

    /// Detail fetches in flight at once
    pub detail_concurrency: usize,

    /// Fetch detail pages; when false records carry listing data only
    pub fetch_details: bool,

    /// Optional deadline for a whole run, in seconds
    pub run_timeout_secs: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            max_items: None,
            requests_per_second: 2,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            detail_concurrency: 1,
            fetch_details: true,
            run_timeout_secs: None,
        }
    }
}

/// Aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub top_n_authors: usize,

    pub top_n_words: usize,

    /// UTC offset of publish times that carry no zone, e.g. `+08:00`
    pub source_utc_offset: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_n_authors: 5,
            top_n_words: 10,
            source_utc_offset: String::from("+08:00"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl LoggingConfig {
    /// Filter directive for the crate's own logs; dependencies stay at `warn`
    ///
    /// `verbose` raises the crate to `debug` and dependencies to `info`.
    #[must_use]
    pub fn filter_directive(&self, verbose: bool) -> String {
        if verbose {
            String::from("newsdrift=debug,info")
        } else {
            format!("newsdrift={},warn", self.level.trim().to_ascii_lowercase())
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables keep their default value.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let listing_url =
            std::env::var("NEWSDRIFT_LISTING_URL").unwrap_or(defaults.crawler.listing_url);

        let category = std::env::var("NEWSDRIFT_CATEGORY").unwrap_or(defaults.crawler.category);

        let max_items = std::env::var("NEWSDRIFT_MAX_ITEMS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .or(defaults.crawler.max_items);

        let requests_per_second = std::env::var("NEWSDRIFT_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.crawler.requests_per_second);

        let request_timeout_secs = std::env::var("NEWSDRIFT_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.crawler.request_timeout_secs);

        let user_agent =
            std::env::var("NEWSDRIFT_USER_AGENT").unwrap_or(defaults.crawler.user_agent);

        let accept_language =
            std::env::var("NEWSDRIFT_ACCEPT_LANGUAGE").unwrap_or(defaults.crawler.accept_language);

        let detail_concurrency = std::env::var("NEWSDRIFT_DETAIL_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.crawler.detail_concurrency);

        let fetch_details = std::env::var("NEWSDRIFT_FETCH_DETAILS")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(defaults.crawler.fetch_details);

        let run_timeout_secs = std::env::var("NEWSDRIFT_RUN_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .or(defaults.crawler.run_timeout_secs);

        let max_retries = std::env::var("NEWSDRIFT_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.retry.max_retries);

        let retry_delay_ms = std::env::var("NEWSDRIFT_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        let top_n_authors = std::env::var("NEWSDRIFT_TOP_AUTHORS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.analytics.top_n_authors);

        let top_n_words = std::env::var("NEWSDRIFT_TOP_WORDS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.analytics.top_n_words);

        let source_utc_offset = std::env::var("NEWSDRIFT_SOURCE_UTC_OFFSET")
            .unwrap_or(defaults.analytics.source_utc_offset);

        let log_level =
            std::env::var("NEWSDRIFT_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format =
            std::env::var("NEWSDRIFT_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            crawler: CrawlerConfig {
                listing_url,
                category,
                max_items,
                requests_per_second,
                request_timeout_secs,
                user_agent,
                accept_language,
                detail_concurrency,
                fetch_details,
                run_timeout_secs,
            },
            retry: RetryConfig {
                max_retries,
                backoff: retry_delay_ms
                    .map(|delay_ms| BackoffPolicy::Fixed { delay_ms })
                    .unwrap_or_default(),
            },
            rules: RuleConfig::default(),
            analytics: AnalyticsConfig {
                top_n_authors,
                top_n_words,
                source_utc_offset,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_absolute_http(&self.crawler.listing_url)
            .with_context(|| format!("Invalid listing_url: {}", self.crawler.listing_url))?;

        if self.crawler.category.trim().is_empty() {
            anyhow::bail!("category must not be empty");
        }

        if self.crawler.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.crawler.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.crawler.detail_concurrency == 0 {
            anyhow::bail!("detail_concurrency must be greater than 0");
        }

        if self.crawler.run_timeout_secs == Some(0) {
            anyhow::bail!("run_timeout_secs must be greater than 0 when set");
        }

        if !LOG_LEVELS.contains(&self.logging.level.trim().to_ascii_lowercase().as_str()) {
            anyhow::bail!("logging.level must be one of {}", LOG_LEVELS.join(", "));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        self.source_offset()?;
        RuleSet::from_config(&self.rules).context("Invalid extraction rules")?;

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.request_timeout_secs)
    }

    /// Parsed `analytics.source_utc_offset`
    pub fn source_offset(&self) -> Result<FixedOffset> {
        self.analytics
            .source_utc_offset
            .parse::<FixedOffset>()
            .map_err(|e| anyhow::anyhow!("Invalid source_utc_offset '{}': {e}", self.analytics.source_utc_offset))
    }

    #[must_use]
    pub fn fetcher_settings(&self) -> FetcherSettings {
        FetcherSettings {
            requests_per_second: self.crawler.requests_per_second,
            request_timeout: self.request_timeout(),
            user_agent: self.crawler.user_agent.clone(),
            accept_language: self.crawler.accept_language.clone(),
            retry: self.retry.clone(),
        }
    }

    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            listing_url: self.crawler.listing_url.clone(),
            category: self.crawler.category.clone(),
            max_items: self.crawler.max_items,
            retry: self.retry.clone(),
            detail_concurrency: self.crawler.detail_concurrency,
            fetch_details: self.crawler.fetch_details,
            run_timeout: self.crawler.run_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn aggregator(&self) -> Result<Aggregator> {
        Ok(Aggregator::new(
            self.analytics.top_n_authors,
            self.analytics.top_n_words,
            self.source_offset()?,
        ))
    }
}
