//! HTTP fetcher with bounded retry, pacing and charset detection
//!
//! [`NewsFetcher`] knows nothing about page semantics. It issues GET
//! requests with a fixed header set, retries failed attempts up to a hard
//! ceiling and folds the final result into a [`FetchOutcome`]. Network
//! failures never escape as errors.
//!
//! Features:
//! - Rate limiting with governor (sequential pacing)
//! - Pluggable backoff between attempts
//! - Charset detection: `Content-Type`, strict UTF-8, `<meta charset>`, GB18030

use encoding_rs::{Encoding, GB18030, UTF_8};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use regex::Regex;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use std::num::NonZeroU32;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use crate::crawler::events::{CrawlEvent, Diagnostics};
use crate::crawler::headers::{build_default_headers, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_USER_AGENT};
use crate::crawler::url::validate_absolute_http;
use crate::error::Result;
use crate::metrics;
use crate::models::FetchOutcome;
use crate::utils::error::FetchError;
use crate::utils::retry::{retry_with, BackoffPolicy, RetryConfig};

/// Bytes of the body searched for a `<meta charset>` declaration
const META_SNIFF_LIMIT: usize = 2048;

static META_CHARSET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_\-:.]+)"#).unwrap()
});

/// Construction parameters for [`NewsFetcher`]
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    /// Maximum number of attempts started per second
    pub requests_per_second: u32,

    /// Timeout applied to each attempt
    pub request_timeout: Duration,

    pub user_agent: String,

    pub accept_language: String,

    /// Retry ceiling and backoff used by [`NewsFetcher::fetch`]
    pub retry: RetryConfig,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

/// Resilient page fetcher
///
/// Safe to share behind an `Arc` across concurrent detail fetches; the rate
/// limiter is shared by all of them.
pub struct NewsFetcher {
    /// HTTP client carrying the default header set and per-attempt timeout
    client: Client,

    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    retry: RetryConfig,

    diagnostics: Diagnostics,
}

impl std::fmt::Debug for NewsFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsFetcher")
            .field("retry", &self.retry)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl NewsFetcher {
    /// Create a fetcher from its settings
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for header values that are not valid HTTP
    /// header text and `Error::Http` if the client cannot be built
    pub fn new(settings: FetcherSettings) -> Result<Self> {
        let headers = build_default_headers(&settings.user_agent, &settings.accept_language)?;

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .gzip(true)
            .build()?;

        let rate = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            retry: settings.retry,
            diagnostics: Diagnostics::new(),
        })
    }

    /// Attach a diagnostics dispatcher
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Fetch `url` using the configured retry settings
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        self.fetch_with(url, self.retry.max_attempts(), &self.retry.backoff)
            .await
    }

    /// Fetch `url` with an explicit attempt ceiling and backoff policy
    ///
    /// A `max_attempts` of zero is treated as one. A URL that is not an
    /// absolute http(s) URL fails immediately after a single attempt and
    /// performs no I/O.
    pub async fn fetch_with(
        &self,
        url: &str,
        max_attempts: u32,
        backoff: &BackoffPolicy,
    ) -> FetchOutcome {
        let target = match validate_absolute_http(url) {
            Ok(target) => target,
            Err(rejection) => {
                let error = FetchError::InvalidUrl(rejection.to_string());
                return self.finish(FetchOutcome::failed(url, 1, error));
            }
        };

        let attempted = retry_with(
            max_attempts,
            backoff,
            FetchError::is_retryable,
            |attempt, error: &FetchError, delay| {
                metrics::record_fetch_retry();
                tracing::debug!(url = %url, attempt, delay_ms = delay.as_millis() as u64, "Retry scheduled");
                self.diagnostics.emit(CrawlEvent::RetryScheduled {
                    url: url.to_string(),
                    attempt,
                    error: error.to_string(),
                });
            },
            |attempt| self.attempt(&target, attempt),
        )
        .await;

        let outcome = match attempted.result {
            Ok(body) => FetchOutcome::success(url, attempted.attempts, body),
            Err(error) => FetchOutcome::failed(url, attempted.attempts, error),
        };

        self.finish(outcome)
    }

    /// Record the terminal outcome and hand it back
    fn finish(&self, outcome: FetchOutcome) -> FetchOutcome {
        match outcome.error() {
            None => {
                metrics::record_fetch_outcome(true, "");
                tracing::debug!(url = %outcome.url(), attempts = outcome.attempts(), "Fetch succeeded");
            }
            Some(error) => {
                metrics::record_fetch_outcome(false, error.code());
                self.diagnostics.emit(CrawlEvent::FetchFailed {
                    url: outcome.url().to_string(),
                    attempts: outcome.attempts(),
                    error: error.to_string(),
                });
            }
        }
        outcome
    }

    /// One paced GET; any non-2xx status is a failed attempt
    async fn attempt(&self, url: &Url, attempt: u32) -> std::result::Result<String, FetchError> {
        self.rate_limiter.until_ready().await;
        metrics::record_fetch_attempt();

        tracing::trace!(url = %url, attempt, "Sending request");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        decode_response(response).await
    }
}

fn classify_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(e)
    }
}

async fn decode_response(response: Response) -> std::result::Result<String, FetchError> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_default();

    let bytes = response.bytes().await.map_err(classify_transport_error)?;

    decode_bytes(&bytes, &content_type)
}

/// Decode a response body to text
///
/// Strategies, in order:
/// 1. The charset named in `Content-Type`, if it decodes cleanly
/// 2. Strict UTF-8
/// 3. A `<meta charset>` declaration near the top of the document
/// 4. GB18030, a superset of the GBK/GB2312 pages the source site serves
///
/// # Errors
///
/// Returns `FetchError::Decode` if every strategy fails
pub fn decode_bytes(bytes: &[u8], content_type: &str) -> std::result::Result<String, FetchError> {
    if let Some(encoding) = header_charset(content_type) {
        if let Some(text) = decode_strict(encoding, bytes) {
            return Ok(text);
        }
        tracing::debug!(charset = encoding.name(), "Declared charset failed to decode");
    }

    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return Ok(text.into_owned());
    }

    if let Some(encoding) = meta_charset(bytes) {
        if let Some(text) = decode_strict(encoding, bytes) {
            return Ok(text);
        }
    }

    decode_strict(GB18030, bytes).ok_or_else(|| {
        FetchError::Decode("body is neither UTF-8 nor a recognised Chinese encoding".to_string())
    })
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    (!had_errors).then(|| text.into_owned())
}

fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Encoding::for_label(value.trim().trim_matches(|c| c == '"' || c == '\'').as_bytes())
    })
}

fn meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(META_SNIFF_LIMIT)]);
    let label = META_CHARSET_REGEX.captures(&head)?.get(1)?.as_str().to_string();
    Encoding::for_label(label.as_bytes())
}
