//! Pagination primitives shared by list operations.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// 1-based page request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl PageRequest {
    pub const MAX_LIMIT: usize = 100;

    pub fn new(page: usize, limit: usize) -> DomainResult<Self> {
        if page == 0 {
            return Err(DomainError::validation("page must be >= 1"));
        }
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1)).saturating_mul(self.limit)
    }
}

/// A page of results plus the total (unpaged) count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    /// Slice an already-ordered result set.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len();
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.limit)
            .collect();
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_zero_page_and_oversized_limit() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, PageRequest::MAX_LIMIT + 1).is_err());
    }

    #[test]
    fn second_page_skips_first_limit_items() {
        let page = Page::from_sorted((0..25).collect(), PageRequest::new(2, 10).unwrap());
        assert_eq!(page.items, (10..20).collect::<Vec<_>>());
        assert_eq!(page.total, 25);
    }

    proptest! {
        /// Property: a page never holds more than `limit` items and total is unpaged.
        #[test]
        fn page_is_bounded(len in 0usize..300, page in 1usize..20, limit in 1usize..=100) {
            let req = PageRequest::new(page, limit).unwrap();
            let p = Page::from_sorted((0..len).collect::<Vec<_>>(), req);
            prop_assert!(p.items.len() <= limit);
            prop_assert_eq!(p.total, len);
        }
    }
}
