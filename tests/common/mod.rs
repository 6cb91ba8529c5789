//! Common test utilities
#![allow(dead_code)]

use chrono::Utc;
use newsdrift::crawler::{FetcherSettings, NewsFetcher, PipelineConfig};
use newsdrift::utils::retry::RetryConfig;
use newsdrift::{DetailFetchStatus, NewsRecord};
use std::sync::Arc;
use std::time::Duration;

/// Test fixture paths
const FIXTURES_DIR: &str = "tests/fixtures/html";

pub fn load_fixture(filename: &str) -> String {
    let path = format!("{FIXTURES_DIR}/{filename}");
    std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to load fixture: {path}"))
}

/// Fetcher settings that keep tests fast: no pacing to speak of and a short timeout
pub fn fast_settings() -> FetcherSettings {
    FetcherSettings {
        requests_per_second: 1000,
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

pub fn fast_fetcher() -> Arc<NewsFetcher> {
    Arc::new(NewsFetcher::new(fast_settings()).expect("test fetcher"))
}

/// Pipeline config pointing at a mock listing page
pub fn pipeline_config(listing_url: String, max_retries: u32) -> PipelineConfig {
    PipelineConfig {
        listing_url,
        category: "新浪新闻".to_string(),
        retry: RetryConfig::new(max_retries),
        ..Default::default()
    }
}

/// Listing page in the `news-item` layout, one row per `(title, href)`
pub fn listing_page(rows: &[(&str, &str)]) -> String {
    let items: String = rows
        .iter()
        .map(|(title, href)| format!(r#"<li class="news-item"><a href="{href}">{title}</a></li>"#))
        .collect();

    format!(r#"<html><body><ul class="news-list">{items}</ul></body></html>"#)
}

/// Detail page with whichever fields are given
pub fn detail_page(content: &str, publish_time: Option<&str>, author: Option<&str>) -> String {
    let date = publish_time
        .map(|t| format!(r#"<span class="date">{t}</span>"#))
        .unwrap_or_default();
    let byline = author
        .map(|a| format!(r#"<p class="show_author">{a}</p>"#))
        .unwrap_or_default();

    format!(r#"<html><body>{date}{byline}<div id="article"><p>{content}</p></div></body></html>"#)
}

pub fn create_test_record(title: &str, author: Option<&str>, publish_time: Option<&str>) -> NewsRecord {
    NewsRecord {
        title: title.to_string(),
        url: "https://news.sina.com.cn/c/2024-03-15/doc-1.shtml".to_string(),
        discovered_at: Utc::now(),
        category: "新浪新闻".to_string(),
        publish_time: publish_time.map(str::to_string),
        author: author.map(str::to_string),
        content: None,
        detail_fetch_status: DetailFetchStatus::Success,
    }
}
