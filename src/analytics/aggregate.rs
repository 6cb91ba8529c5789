//! Summary statistics over a record set
//!
//! Aggregation is a pure function of its input. Every call recomputes from
//! scratch; nothing is cached or mutated between calls. The output is the
//! hand-off value for reporting and charting.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analytics::frequency::{CountEntry, FrequencyTable};
use crate::models::{DetailFetchStatus, NewsRecord};

/// Naive layouts tried in order; longer layouts come first so a shorter one
/// never swallows part of a longer timestamp
const DATETIME_FORMATS: &[&str] = &[
    "%Y年%m月%d日 %H:%M:%S",
    "%Y年%m月%d日 %H:%M",
    "%Y年%m月%d日%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y年%m月%d日", "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Earliest and latest parsable publish times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub earliest: DateTime<FixedOffset>,
    pub latest: DateTime<FixedOffset>,
}

/// Detail-step outcomes across a record set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailStatusCounts {
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl DetailStatusCounts {
    pub fn record(&mut self, status: DetailFetchStatus) {
        match status {
            DetailFetchStatus::Success => self.success += 1,
            DetailFetchStatus::Failed => self.failed += 1,
            DetailFetchStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.success + self.failed + self.skipped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_records: usize,

    /// Records per category, keyed in name order
    pub by_category: BTreeMap<String, u64>,

    /// Most frequent authors; equal counts keep first-seen order
    pub top_authors: Vec<CountEntry>,

    /// Most frequent whitespace-separated title tokens
    pub top_words: Vec<CountEntry>,

    #[serde(default)]
    pub distinct_authors: usize,

    #[serde(default)]
    pub distinct_words: usize,

    /// `None` when no publish time could be parsed
    pub publish_time_range: Option<TimeRange>,

    /// Number of publish times that parsed
    pub parsed_publish_times: usize,

    /// Records per raw publish-time value, keyed in value order
    pub publish_time_distribution: BTreeMap<String, u64>,

    pub missing_author_rate: f64,

    pub missing_publish_time_rate: f64,

    pub detail_status: DetailStatusCounts,
}

/// Computes [`AggregateStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregator {
    top_n_authors: usize,
    top_n_words: usize,
    source_offset: FixedOffset,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            top_n_authors: 5,
            top_n_words: 10,
            source_offset: china_standard_time(),
        }
    }
}

impl Aggregator {
    /// `source_offset` is applied to publish times that carry no zone
    pub fn new(top_n_authors: usize, top_n_words: usize, source_offset: FixedOffset) -> Self {
        Self {
            top_n_authors,
            top_n_words,
            source_offset,
        }
    }

    pub fn aggregate(&self, records: &[NewsRecord]) -> AggregateStats {
        let mut by_category = BTreeMap::new();
        let mut authors = FrequencyTable::new();
        let mut words = FrequencyTable::new();
        let mut distribution = BTreeMap::new();
        let mut detail_status = DetailStatusCounts::default();
        let mut range: Option<TimeRange> = None;
        let mut parsed_publish_times = 0;
        let mut missing_author = 0usize;
        let mut missing_publish_time = 0usize;

        for record in records {
            *by_category.entry(record.category.clone()).or_insert(0) += 1;
            detail_status.record(record.detail_fetch_status);

            for word in record.title.split_whitespace() {
                words.add(word);
            }

            match present(&record.author) {
                Some(author) => authors.add(author),
                None => missing_author += 1,
            }

            let Some(raw) = present(&record.publish_time) else {
                missing_publish_time += 1;
                continue;
            };

            *distribution.entry(raw.to_string()).or_insert(0) += 1;

            if let Some(parsed) = parse_publish_time(raw, self.source_offset) {
                parsed_publish_times += 1;
                range = Some(match range {
                    None => TimeRange {
                        earliest: parsed,
                        latest: parsed,
                    },
                    Some(current) => TimeRange {
                        earliest: current.earliest.min(parsed),
                        latest: current.latest.max(parsed),
                    },
                });
            }
        }

        tracing::debug!(
            records = records.len(),
            distinct_authors = authors.len(),
            distinct_words = words.len(),
            "Aggregated record set"
        );

        AggregateStats {
            total_records: records.len(),
            by_category,
            top_authors: authors.top(self.top_n_authors),
            top_words: words.top(self.top_n_words),
            distinct_authors: authors.len(),
            distinct_words: words.len(),
            publish_time_range: range,
            parsed_publish_times,
            publish_time_distribution: distribution,
            missing_author_rate: rate(missing_author, records.len()),
            missing_publish_time_rate: rate(missing_publish_time, records.len()),
            detail_status,
        }
    }
}

/// Aggregate with the default settings
pub fn aggregate(records: &[NewsRecord]) -> AggregateStats {
    Aggregator::default().aggregate(records)
}

/// UTC+08:00, the zone the source site publishes in
pub fn china_standard_time() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("UTC+08:00 is within range")
}

/// Parse a raw publish-time string
///
/// Accepts RFC 3339 and the common Chinese and ISO layouts, with trailing
/// text such as a source attribution ignored. Times without a zone are
/// taken to be in `offset`; date-only values mean midnight.
pub fn parse_publish_time(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }

    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_and_remainder(raw, format).ok())
        .map(|(naive, _)| naive)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_and_remainder(raw, format).ok())
                .and_then(|(date, _)| date.and_hms_opt(0, 0, 0))
        })?;

    offset.from_local_datetime(&naive).single()
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
