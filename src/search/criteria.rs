//! Search criteria
//!
//! The structured form of a search request: title phrase, required tags and
//! the zero-based page window.

use std::collections::BTreeSet;
use std::num::NonZeroU32;

use super::tokenizer::ParsedQuery;

/// Structured search filter plus page window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criteria {
    title: String,
    tags: BTreeSet<String>,
    page_number: u32,
    page_size: NonZeroU32,
}

impl Criteria {
    /// Build criteria from a tokenized query. Tags are de-duplicated so the
    /// requested-set cardinality is exact.
    pub fn new(query: ParsedQuery, page_number: u32, page_size: NonZeroU32) -> Self {
        Self {
            title: query.title,
            tags: query.tags.into_iter().collect(),
            page_number,
            page_size,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_title(&self) -> bool {
        !self.title.is_empty()
    }

    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    /// Zero-based page number
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size
    }

    /// Row limit for the page select
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size.get())
    }

    /// Row offset for the page select
    pub fn offset(&self) -> i64 {
        i64::from(self.page_number).saturating_mul(i64::from(self.page_size.get()))
    }
}
