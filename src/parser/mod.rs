//! HTML extraction with fallback chains
//!
//! This module turns raw listing and detail pages into typed values. Page
//! layouts drift over time, so every field is located through an ordered
//! list of [`ExtractionRule`]s rather than a single selector.

pub mod extractor;
pub mod rules;
pub mod sanitize;

pub use extractor::{ExtractedContent, Extractor, ListingEntry, ListingExtraction};
pub use rules::{DetailRules, ExtractionRule, RuleConfig, RuleSet, RuleSpec};
