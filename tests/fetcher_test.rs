//! Integration tests for NewsFetcher using wiremock
//!
//! These tests validate retry bounds, headers and decoding against mock servers.

mod common;

use newsdrift::crawler::{ChannelSink, CrawlEvent, Diagnostics, FetcherSettings, NewsFetcher};
use newsdrift::models::FetchStatus;
use newsdrift::utils::error::FetchError;
use newsdrift::utils::retry::{BackoffPolicy, RetryConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{fast_settings, load_fixture};

/// Test successful fetch from mock server
#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;
    let html = load_fixture("detail_article.html");

    Mock::given(method("GET"))
        .and(path("/c/2024-03-15/doc-1.shtml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = NewsFetcher::new(fast_settings()).unwrap();
    let url = format!("{}/c/2024-03-15/doc-1.shtml", mock_server.uri());
    let outcome = fetcher.fetch(&url).await;

    assert!(outcome.is_success(), "Fetch should succeed: {:?}", outcome.error());
    assert_eq!(outcome.status(), FetchStatus::Success);
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(outcome.url(), url);
    assert!(outcome.body().unwrap().contains("中国人民银行今日宣布上调基准利率"));
    assert!(outcome.error().is_none());
}

/// The fixed header set goes out on every request
#[tokio::test]
async fn test_request_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "newsdrift-test/1.0"))
        .and(header("accept-language", "zh-CN"))
        .and(header_exists("accept"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let settings = FetcherSettings {
        user_agent: "newsdrift-test/1.0".to_string(),
        accept_language: "zh-CN".to_string(),
        ..fast_settings()
    };
    let fetcher = NewsFetcher::new(settings).unwrap();

    let outcome = fetcher.fetch(&format!("{}/", mock_server.uri())).await;
    assert!(outcome.is_success(), "Headers should match: {:?}", outcome.error());
}

/// Retried attempts carry the same header set as the first one
#[tokio::test]
async fn test_request_headers_on_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "newsdrift-test/1.0"))
        .and(header("accept-language", "zh-CN"))
        .and(header_exists("accept"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "newsdrift-test/1.0"))
        .and(header("accept-language", "zh-CN"))
        .and(header_exists("accept"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let settings = FetcherSettings {
        user_agent: "newsdrift-test/1.0".to_string(),
        accept_language: "zh-CN".to_string(),
        retry: RetryConfig::new(2),
        ..fast_settings()
    };
    let fetcher = NewsFetcher::new(settings).unwrap();

    let outcome = fetcher.fetch(&format!("{}/", mock_server.uri())).await;
    assert!(outcome.is_success(), "Headers should match on every attempt: {:?}", outcome.error());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.body(), Some("ok"));
}

/// Test that server errors trigger retries
#[tokio::test]
async fn test_server_error_retry() {
    let mock_server = MockServer::start().await;

    // Return 500 twice, then succeed
    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&mock_server)
        .await;

    let fetcher = NewsFetcher::new(fast_settings()).unwrap();
    let outcome = fetcher.fetch(&format!("{}/test", mock_server.uri())).await;

    assert!(outcome.is_success(), "Should succeed after retries");
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.body(), Some("OK"));
}

/// A permanently failing URL is attempted exactly max_attempts times
#[tokio::test]
async fn test_attempt_ceiling_is_exact() {
    for max_attempts in 1..=5u32 {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(u64::from(max_attempts))
            .mount(&mock_server)
            .await;

        let fetcher = NewsFetcher::new(fast_settings()).unwrap();
        let outcome = fetcher
            .fetch_with(
                &format!("{}/down", mock_server.uri()),
                max_attempts,
                &BackoffPolicy::None,
            )
            .await;

        assert_eq!(outcome.status(), FetchStatus::Failed);
        assert_eq!(outcome.attempts(), max_attempts);
        assert!(outcome.body().is_none());
        assert!(matches!(outcome.error(), Some(FetchError::ServerError(503))));

        mock_server.verify().await;
    }
}

/// Client errors are retried like server errors
#[tokio::test]
async fn test_not_found_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(4)
        .mount(&mock_server)
        .await;

    // Default retry config: 3 retries after the first attempt
    let fetcher = NewsFetcher::new(fast_settings()).unwrap();
    let outcome = fetcher
        .fetch(&format!("{}/missing", mock_server.uri()))
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts(), 4);
    assert!(matches!(outcome.error(), Some(FetchError::ServerError(404))));
}

#[tokio::test]
async fn test_zero_attempts_means_one() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = NewsFetcher::new(fast_settings()).unwrap();
    let outcome = fetcher
        .fetch_with(&format!("{}/", mock_server.uri()), 0, &BackoffPolicy::None)
        .await;

    assert_eq!(outcome.attempts(), 1);
    assert!(!outcome.is_success());
}

/// Test per-attempt timeout handling
#[tokio::test]
async fn test_timeout_handling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(2)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let settings = FetcherSettings {
        request_timeout: Duration::from_millis(200),
        ..fast_settings()
    };
    let fetcher = NewsFetcher::new(settings).unwrap();

    let outcome = fetcher
        .fetch_with(&format!("{}/slow", mock_server.uri()), 2, &BackoffPolicy::None)
        .await;

    assert_eq!(outcome.attempts(), 2);
    assert!(matches!(outcome.error(), Some(FetchError::Timeout)));
}

/// Nothing listening on the port: every attempt is a transport failure
#[tokio::test]
async fn test_connection_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let fetcher = NewsFetcher::new(fast_settings()).unwrap();
    let outcome = fetcher
        .fetch_with(&format!("http://127.0.0.1:{port}/"), 2, &BackoffPolicy::None)
        .await;

    assert_eq!(outcome.attempts(), 2);
    assert!(matches!(outcome.error(), Some(FetchError::Http(_))));
}

#[tokio::test]
async fn test_malformed_url_performs_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = NewsFetcher::new(fast_settings()).unwrap();

    let outcome = fetcher.fetch("/c/2024-03-15/doc-1.shtml").await;
    assert_eq!(outcome.attempts(), 1);
    assert!(matches!(outcome.error(), Some(FetchError::InvalidUrl(_))));

    let outcome = fetcher.fetch("http://").await;
    assert_eq!(outcome.attempts(), 1);
    assert!(matches!(outcome.error(), Some(FetchError::InvalidUrl(_))));
}

/// GBK pages declared in Content-Type come back as proper text
#[tokio::test]
async fn test_gbk_body_is_decoded() {
    let mock_server = MockServer::start().await;
    let (bytes, _, _) = encoding_rs::GBK.encode("<html><body>央行上调利率</body></html>");

    Mock::given(method("GET"))
        .and(path("/gbk"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes.into_owned(), "text/html; charset=gbk"))
        .mount(&mock_server)
        .await;

    let fetcher = NewsFetcher::new(fast_settings()).unwrap();
    let outcome = fetcher.fetch(&format!("{}/gbk", mock_server.uri())).await;

    assert!(outcome.is_success(), "GBK body should decode: {:?}", outcome.error());
    assert!(outcome.body().unwrap().contains("央行上调利率"));
}

#[tokio::test]
async fn test_fixed_backoff_waits_between_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = NewsFetcher::new(fast_settings()).unwrap();
    let started = Instant::now();
    let outcome = fetcher
        .fetch_with(
            &format!("{}/", mock_server.uri()),
            3,
            &BackoffPolicy::Fixed { delay_ms: 100 },
        )
        .await;

    assert_eq!(outcome.attempts(), 3);
    assert!(started.elapsed() >= Duration::from_millis(200));
}

/// Retries and the final failure are reported to an attached sink
#[tokio::test]
async fn test_retry_events_reach_sink() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let (sink, mut events) = ChannelSink::new();
    let settings = FetcherSettings {
        retry: RetryConfig::new(2),
        ..fast_settings()
    };
    let fetcher = NewsFetcher::new(settings)
        .unwrap()
        .with_diagnostics(Diagnostics::with_sink(Arc::new(sink)));

    let url = format!("{}/flaky", mock_server.uri());
    let outcome = fetcher.fetch(&url).await;
    assert_eq!(outcome.attempts(), 3);

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    let kinds: Vec<&str> = received.iter().map(CrawlEvent::kind).collect();
    assert_eq!(kinds, vec!["retry_scheduled", "retry_scheduled", "fetch_failed"]);
    assert!(matches!(
        &received[0],
        CrawlEvent::RetryScheduled { attempt: 2, .. }
    ));
    assert!(matches!(
        &received[2],
        CrawlEvent::FetchFailed { attempts: 3, url: u, .. } if *u == url
    ));
}
