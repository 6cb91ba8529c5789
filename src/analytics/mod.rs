//! Statistics over crawled records

pub mod aggregate;
pub mod frequency;

pub use aggregate::{
    aggregate, china_standard_time, parse_publish_time, AggregateStats, Aggregator,
    DetailStatusCounts, TimeRange,
};
pub use frequency::{CountEntry, FrequencyTable};
