// src/domain/paginated.rs

use serde::{Deserialize, Serialize};

/// First page number on paginated catalog endpoints
pub const FIRST_PAGE: u32 = 1;

/// One or more pages of a paginated listing.
///
/// A collection holding `None` means "not fetched yet"; `Some` with no items is an
/// empty fetched result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    /// Search query that produced this result, if any
    pub query: Option<String>,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, page: u32, total_pages: u32) -> Self {
        Self {
            items,
            page,
            total_pages,
            query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Another page exists after the last one loaded
    pub fn can_fetch_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn next_page(&self) -> u32 {
        self.page + 1
    }

    /// Fold a freshly fetched page into the current result.
    ///
    /// First pages and pages for a different query replace the result, later pages
    /// append to it.
    pub fn append(self, next: PaginatedResult<T>) -> PaginatedResult<T> {
        if next.page <= FIRST_PAGE || self.query != next.query {
            return next;
        }
        let mut items = self.items;
        items.extend(next.items);
        PaginatedResult {
            items,
            page: next.page,
            total_pages: next.total_pages,
            query: next.query,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            total_pages: self.total_pages,
            query: self.query,
        }
    }
}

/// Cursor rule: a next page can be requested iff a result exists and is not on its last page
pub fn can_fetch_next<T>(result: Option<&PaginatedResult<T>>) -> bool {
    result.is_some_and(|r| r.can_fetch_next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_fetch_next() {
        assert!(!can_fetch_next(Some(&PaginatedResult::<u32>::new(vec![], 2, 2))));
        assert!(can_fetch_next(Some(&PaginatedResult::<u32>::new(vec![], 1, 2))));
        assert!(!can_fetch_next::<u32>(None));
    }

    #[test]
    fn test_append_extends_later_pages() {
        let first = PaginatedResult::new(vec![1, 2], 1, 3);
        let second = PaginatedResult::new(vec![3], 2, 3);
        let merged = first.append(second);
        assert_eq!(merged.items, vec![1, 2, 3]);
        assert_eq!(merged.page, 2);
    }

    #[test]
    fn test_append_first_page_replaces() {
        let current = PaginatedResult::new(vec![1, 2], 2, 3);
        let fresh = PaginatedResult::new(vec![9], 1, 5);
        assert_eq!(current.append(fresh).items, vec![9]);
    }

    #[test]
    fn test_append_other_query_replaces() {
        let current = PaginatedResult::new(vec![1], 1, 3).with_query("heat");
        let other = PaginatedResult::new(vec![7], 2, 3).with_query("alien");
        let merged = current.append(other);
        assert_eq!(merged.items, vec![7]);
        assert_eq!(merged.query.as_deref(), Some("alien"));
    }
}
