//! End-to-end crawl runs against wiremock servers

mod common;

use newsdrift::crawler::{
    ChannelSink, CrawlEvent, CrawlPipeline, Diagnostics, ListingFailure, RunState, TerminalState,
};
use newsdrift::DetailFetchStatus;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{detail_page, fast_fetcher, listing_page, load_fixture, pipeline_config};

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn drain(events: &mut tokio::sync::mpsc::UnboundedReceiver<CrawlEvent>) -> Vec<CrawlEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

#[tokio::test]
async fn test_listing_with_one_empty_title() {
    let server = MockServer::start().await;
    let base = server.uri();

    let listing = listing_page(&[
        ("央行 上调 利率", format!("{base}/c/1.shtml").as_str()),
        ("   ", format!("{base}/c/2.shtml").as_str()),
        ("股市 创 新高", format!("{base}/c/3.shtml").as_str()),
    ]);
    mount_page(&server, "/", listing).await;
    mount_page(
        &server,
        "/c/1.shtml",
        detail_page("利率上调", Some("2024年03月15日 08:30"), Some("张三")),
    )
    .await;
    mount_page(
        &server,
        "/c/3.shtml",
        detail_page("沪指新高", Some("2024-03-16 09:00"), Some("李四")),
    )
    .await;

    let (sink, mut events) = ChannelSink::new();
    let pipeline = CrawlPipeline::new(pipeline_config(format!("{base}/"), 2), fast_fetcher())
        .with_diagnostics(Diagnostics::with_sink(Arc::new(sink)));

    let run = pipeline.run().await;

    assert_eq!(run.terminal, TerminalState::Done);
    assert_eq!(run.records.len(), 2);
    assert_eq!(run.summary.listed, 3);
    assert_eq!(run.summary.skipped, 1);
    assert_eq!(run.summary.detail_succeeded, 2);

    assert_eq!(run.records[0].title, "央行 上调 利率");
    assert_eq!(run.records[0].url, format!("{base}/c/1.shtml"));
    assert_eq!(run.records[0].category, "新浪新闻");
    assert_eq!(run.records[0].author.as_deref(), Some("张三"));
    assert_eq!(run.records[0].publish_time.as_deref(), Some("2024年03月15日 08:30"));
    assert_eq!(run.records[0].content.as_deref(), Some("利率上调"));
    assert_eq!(run.records[1].title, "股市 创 新高");

    assert_eq!(
        run.states,
        vec![
            RunState::Idle,
            RunState::FetchingListing,
            RunState::ExtractingListing,
            RunState::FetchingDetail,
            RunState::ExtractingDetail,
            RunState::Building,
            RunState::FetchingDetail,
            RunState::ExtractingDetail,
            RunState::Building,
            RunState::Aggregating,
            RunState::Done,
        ]
    );

    assert_eq!(run.stats.total_records, 2);
    assert_eq!(run.stats.by_category.get("新浪新闻"), Some(&2));
    assert_eq!(run.stats.detail_status.success, 2);

    let rejected: Vec<CrawlEvent> = drain(&mut events)
        .into_iter()
        .filter(|e| e.kind() == "item_rejected")
        .collect();
    assert_eq!(rejected.len(), 1);
    assert!(matches!(
        &rejected[0],
        CrawlEvent::ItemRejected { reason, .. } if reason == "empty_title"
    ));
}

#[tokio::test]
async fn test_listing_fetch_failure_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let (sink, mut events) = ChannelSink::new();
    let pipeline = CrawlPipeline::new(pipeline_config(format!("{}/", server.uri()), 2), fast_fetcher())
        .with_diagnostics(Diagnostics::with_sink(Arc::new(sink)));

    let run = pipeline.run().await;

    assert_eq!(
        run.terminal,
        TerminalState::ListingUnavailable {
            failure: ListingFailure::FetchFailed { attempts: 3 }
        }
    );
    assert!(run.records.is_empty());
    assert_eq!(run.stats.total_records, 0);
    assert_eq!(
        run.states,
        vec![
            RunState::Idle,
            RunState::FetchingListing,
            RunState::ListingUnavailable
        ]
    );

    let received = drain(&mut events);
    assert!(received.iter().any(|e| matches!(
        e,
        CrawlEvent::ListingUnavailable { code, .. } if code == "listing_fetch_failed"
    )));
}

#[tokio::test]
async fn test_unknown_listing_layout_is_unavailable() {
    let server = MockServer::start().await;
    mount_page(&server, "/", load_fixture("listing_redesigned.html")).await;

    let (sink, mut events) = ChannelSink::new();
    let pipeline = CrawlPipeline::new(pipeline_config(format!("{}/", server.uri()), 0), fast_fetcher())
        .with_diagnostics(Diagnostics::with_sink(Arc::new(sink)));

    let run = pipeline.run().await;

    let failure = run.terminal.listing_failure().unwrap();
    assert_eq!(failure, ListingFailure::StructureNotFound);
    assert_eq!(failure.code(), "listing_structure_not_found");
    assert_ne!(failure.code(), ListingFailure::FetchFailed { attempts: 1 }.code());
    assert!(run.records.is_empty());
    assert_eq!(run.states.last(), Some(&RunState::ListingUnavailable));
    assert!(run.states.contains(&RunState::ExtractingListing));

    let kinds: Vec<&str> = drain(&mut events).iter().map(CrawlEvent::kind).collect();
    assert!(kinds.contains(&"listing_structure_not_found"));
    assert!(kinds.contains(&"listing_unavailable"));
}

#[tokio::test]
async fn test_no_valid_items_is_done() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        listing_page(&[("相对 链接", "/c/1.shtml"), ("", "https://news.sina.com.cn/c/2.shtml")]),
    )
    .await;

    let run = CrawlPipeline::new(pipeline_config(format!("{}/", server.uri()), 0), fast_fetcher())
        .run()
        .await;

    assert!(run.terminal.is_done());
    assert!(run.records.is_empty());
    assert_eq!(run.summary.skipped, 2);
    assert_eq!(run.stats.total_records, 0);
}

#[tokio::test]
async fn test_detail_failure_stays_local() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        listing_page(&[
            ("央行 上调 利率", format!("{base}/c/1.shtml").as_str()),
            ("股市 创 新高", format!("{base}/c/2.shtml").as_str()),
        ]),
    )
    .await;
    mount_page(
        &server,
        "/c/1.shtml",
        detail_page("利率上调", Some("2024-03-15 08:30"), Some("张三")),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/c/2.shtml"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let run = CrawlPipeline::new(pipeline_config(format!("{base}/"), 1), fast_fetcher())
        .run()
        .await;

    assert!(run.terminal.is_done());
    assert_eq!(run.records.len(), 2);

    let ok = &run.records[0];
    assert_eq!(ok.detail_fetch_status, DetailFetchStatus::Success);
    assert_eq!(ok.author.as_deref(), Some("张三"));
    assert!(ok.content.is_some());

    let failed = &run.records[1];
    assert_eq!(failed.title, "股市 创 新高");
    assert_eq!(failed.detail_fetch_status, DetailFetchStatus::Failed);
    assert!(failed.content.is_none());
    assert!(failed.author.is_none());
    assert!(failed.publish_time.is_none());

    assert_eq!(run.summary.detail_failed, 1);
    assert_eq!(run.stats.detail_status.failed, 1);
    assert_eq!(run.stats.missing_author_rate, 0.5);
}

#[tokio::test]
async fn test_detail_without_structure_is_success_with_empty_fields() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        listing_page(&[("页面 改版", format!("{base}/c/1.shtml").as_str())]),
    )
    .await;
    mount_page(&server, "/c/1.shtml", load_fixture("detail_no_structure.html")).await;

    let (sink, mut events) = ChannelSink::new();
    let run = CrawlPipeline::new(pipeline_config(format!("{base}/"), 0), fast_fetcher())
        .with_diagnostics(Diagnostics::with_sink(Arc::new(sink)))
        .run()
        .await;

    let record = &run.records[0];
    assert_eq!(record.detail_fetch_status, DetailFetchStatus::Success);
    assert!(record.content.is_none());
    assert!(record.author.is_none());
    assert!(record.publish_time.is_none());

    let kinds: Vec<&str> = drain(&mut events).iter().map(CrawlEvent::kind).collect();
    assert!(kinds.contains(&"detail_structure_not_found"));
}

#[tokio::test]
async fn test_concurrent_details_keep_listing_order() {
    let server = MockServer::start().await;
    let base = server.uri();

    let rows: Vec<(String, String)> = (1..=4)
        .map(|i| (format!("新闻 {i}"), format!("{base}/c/{i}.shtml")))
        .collect();
    let row_refs: Vec<(&str, &str)> = rows.iter().map(|(t, u)| (t.as_str(), u.as_str())).collect();
    mount_page(&server, "/", listing_page(&row_refs)).await;

    // Earlier items answer later
    for i in 1..=4u64 {
        Mock::given(method("GET"))
            .and(path(format!("/c/{i}.shtml")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(detail_page(&format!("正文 {i}"), None, None))
                    .set_delay(Duration::from_millis(50 * (5 - i))),
            )
            .mount(&server)
            .await;
    }

    let sequential = CrawlPipeline::new(pipeline_config(format!("{base}/"), 0), fast_fetcher())
        .run()
        .await;

    let mut config = pipeline_config(format!("{base}/"), 0);
    config.detail_concurrency = 4;
    let concurrent = CrawlPipeline::new(config, fast_fetcher()).run().await;

    let titles: Vec<&str> = concurrent.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["新闻 1", "新闻 2", "新闻 3", "新闻 4"]);

    let summarize = |records: &[newsdrift::NewsRecord]| {
        records
            .iter()
            .map(|r| (r.title.clone(), r.url.clone(), r.content.clone(), r.detail_fetch_status))
            .collect::<Vec<_>>()
    };
    assert_eq!(summarize(&sequential.records), summarize(&concurrent.records));
    assert_eq!(sequential.states, concurrent.states);
}

#[tokio::test]
async fn test_run_deadline_aborts_outstanding_details() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        listing_page(&[("慢 新闻", format!("{base}/c/slow.shtml").as_str())]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/c/slow.shtml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_page("迟到", None, None))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = pipeline_config(format!("{base}/"), 0);
    config.run_timeout = Some(Duration::from_millis(500));

    let run = CrawlPipeline::new(config, fast_fetcher()).run().await;

    assert!(run.terminal.is_done());
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].detail_fetch_status, DetailFetchStatus::Failed);
    assert!(run.records[0].content.is_none());
}

#[tokio::test]
async fn test_run_deadline_on_listing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(load_fixture("listing_news_item.html"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = pipeline_config(format!("{}/", server.uri()), 0);
    config.run_timeout = Some(Duration::from_millis(300));

    let run = CrawlPipeline::new(config, fast_fetcher()).run().await;

    assert_eq!(
        run.terminal.listing_failure(),
        Some(ListingFailure::FetchFailed { attempts: 1 })
    );
}

#[tokio::test]
async fn test_unbounded_run_timeout_completes() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        listing_page(&[("央行 上调 利率", format!("{base}/c/1.shtml").as_str())]),
    )
    .await;
    mount_page(&server, "/c/1.shtml", detail_page("正文", None, None)).await;

    let mut config = pipeline_config(format!("{base}/"), 0);
    config.run_timeout = Some(Duration::from_secs(u64::MAX));

    let run = CrawlPipeline::new(config, fast_fetcher()).run().await;

    assert!(run.terminal.is_done());
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].detail_fetch_status, DetailFetchStatus::Success);
}

#[tokio::test]
async fn test_listing_only_mode_skips_details() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        listing_page(&[
            ("央行 上调 利率", format!("{base}/c/1.shtml").as_str()),
            ("股市 创 新高", format!("{base}/c/2.shtml").as_str()),
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/c/1.shtml"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = pipeline_config(format!("{base}/"), 0);
    config.fetch_details = false;

    let run = CrawlPipeline::new(config, fast_fetcher()).run().await;

    assert_eq!(run.records.len(), 2);
    assert!(run
        .records
        .iter()
        .all(|r| r.detail_fetch_status == DetailFetchStatus::Skipped && r.content.is_none()));
    assert_eq!(run.stats.detail_status.skipped, 2);
    assert_eq!(
        run.states,
        vec![
            RunState::Idle,
            RunState::FetchingListing,
            RunState::ExtractingListing,
            RunState::Building,
            RunState::Building,
            RunState::Aggregating,
            RunState::Done,
        ]
    );
}

#[tokio::test]
async fn test_max_items_limits_detail_fetches() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        listing_page(&[
            ("", format!("{base}/c/0.shtml").as_str()),
            ("第一", format!("{base}/c/1.shtml").as_str()),
            ("第二", format!("{base}/c/2.shtml").as_str()),
            ("第三", format!("{base}/c/3.shtml").as_str()),
        ]),
    )
    .await;
    mount_page(&server, "/c/1.shtml", detail_page("一", None, None)).await;
    mount_page(&server, "/c/2.shtml", detail_page("二", None, None)).await;
    Mock::given(method("GET"))
        .and(path("/c/3.shtml"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = pipeline_config(format!("{base}/"), 0);
    config.max_items = Some(2);

    let run = CrawlPipeline::new(config, fast_fetcher()).run().await;

    let titles: Vec<&str> = run.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["第一", "第二"]);
    assert_eq!(run.summary.skipped, 1);
}

/// Each run owns its record set
#[tokio::test]
async fn test_runs_do_not_share_records() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        listing_page(&[("央行 上调 利率", format!("{base}/c/1.shtml").as_str())]),
    )
    .await;
    mount_page(&server, "/c/1.shtml", detail_page("正文", None, None)).await;

    let pipeline = CrawlPipeline::new(pipeline_config(format!("{base}/"), 0), fast_fetcher());
    let first = pipeline.run().await;
    let second = pipeline.run().await;

    assert_eq!(first.records.len(), 1);
    assert_eq!(second.records.len(), 1);
    assert_eq!(second.stats.total_records, 1);
}

#[tokio::test]
async fn test_crawl_output_serializes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let run = CrawlPipeline::new(pipeline_config(format!("{}/", server.uri()), 0), fast_fetcher())
        .run()
        .await;

    let json = serde_json::to_value(&run).unwrap();
    assert_eq!(json["terminal"]["state"], "listing_unavailable");
    assert_eq!(json["terminal"]["failure"]["reason"], "fetch_failed");
    assert_eq!(json["states"][0], "idle");
    assert_eq!(json["records"].as_array().map(Vec::len), Some(0));
}
