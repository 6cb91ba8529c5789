//! Record assembly
//!
//! [`RecordBuilder`] joins a listing item with whatever its detail page
//! yielded. It is pure: no I/O and no retry. Values are copied verbatim;
//! absent detail fields stay `None`.

use crate::crawler::url::validate_absolute_http;
use crate::models::{DetailFetchStatus, ExtractedDetail, ListingItem, NewsRecord};
use crate::utils::error::ValidationRejection;

/// Builds [`NewsRecord`]s for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBuilder {
    category: String,
}

impl RecordBuilder {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Check that an item can become a record
    ///
    /// # Errors
    ///
    /// Returns the first rejection found: empty title, then URL problems
    pub fn validate(&self, item: &ListingItem) -> Result<(), ValidationRejection> {
        if item.title.trim().is_empty() {
            return Err(ValidationRejection::EmptyTitle);
        }
        validate_absolute_http(&item.url)?;
        Ok(())
    }

    /// Build a record, or `None` when the item fails validation
    pub fn build(
        &self,
        item: &ListingItem,
        detail: Option<ExtractedDetail>,
        status: DetailFetchStatus,
    ) -> Option<NewsRecord> {
        self.validate(item).ok()?;

        let ExtractedDetail {
            content,
            publish_time,
            author,
        } = detail.unwrap_or_default();

        Some(NewsRecord {
            title: item.title.clone(),
            url: item.url.clone(),
            discovered_at: item.discovered_at,
            category: self.category.clone(),
            publish_time,
            author,
            content,
            detail_fetch_status: status,
        })
    }
}
