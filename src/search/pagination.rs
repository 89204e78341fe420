//! Pagination metadata

use std::num::NonZeroU32;

use serde::Serialize;

/// Page position and navigation flags for one page of results.
///
/// `page_number` and `last_page_index` are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page_number: u32,
    pub page_size: u32,
    pub last_page_index: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageMeta {
    /// `last_page_index = max(0, ceil(total / size) - 1)`
    pub fn compute(total: i64, page_size: NonZeroU32, page_number: u32) -> Self {
        let size = i64::from(page_size.get());
        let last_page_index = if total <= 0 { 0 } else { (total - 1) / size };
        let current = i64::from(page_number);

        Self {
            total: total.max(0),
            page_number,
            page_size: page_size.get(),
            last_page_index,
            has_previous: page_number > 0,
            has_next: current < last_page_index,
        }
    }
}
