//! Limit/offset paging for list views.
//!
//! The server does not report totals, so whether a next page exists is
//! guessed from the last page seen: a full page suggests more rows follow.

use thiserror::Error;

use crate::client::Page;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("page size must be at least 1")]
    ZeroLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    limit: usize,
    offset: usize,
    /// Rows in the page fetched for the current window, if seen yet
    observed: Option<usize>,
}

impl Pager {
    pub fn new(limit: usize) -> Result<Self, PaginationError> {
        if limit == 0 {
            return Err(PaginationError::ZeroLimit);
        }
        Ok(Self {
            limit,
            offset: 0,
            observed: None,
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }

    /// Record the row count of the page fetched for the current window
    pub fn observe(&mut self, rows: usize) {
        self.observed = Some(rows);
    }

    pub fn has_next(&self) -> bool {
        self.observed.is_some_and(|rows| rows >= self.limit)
    }

    pub fn has_prev(&self) -> bool {
        self.offset > 0
    }

    /// Advance one page; no-op (returns false) when no next page is known
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.offset += self.limit;
        self.observed = None;
        true
    }

    /// Step back one page, floored at the first page
    pub fn prev(&mut self) -> bool {
        if !self.has_prev() {
            return false;
        }
        self.offset = self.offset.saturating_sub(self.limit);
        self.observed = None;
        true
    }

    /// Change the page size and return to the first page
    pub fn set_limit(&mut self, limit: usize) -> Result<(), PaginationError> {
        if limit == 0 {
            return Err(PaginationError::ZeroLimit);
        }
        self.limit = limit;
        self.offset = 0;
        self.observed = None;
        Ok(())
    }

    /// Jump to an arbitrary offset
    pub fn seek(&mut self, offset: usize) {
        if offset != self.offset {
            self.offset = offset;
            self.observed = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_rejected() {
        assert_eq!(Pager::new(0), Err(PaginationError::ZeroLimit));
        let mut pager = Pager::new(10).unwrap();
        assert_eq!(pager.set_limit(0), Err(PaginationError::ZeroLimit));
        assert_eq!(pager.limit(), 10);
    }

    #[test]
    fn next_requires_a_full_page() {
        let mut pager = Pager::new(100).unwrap();
        assert!(!pager.next());

        pager.observe(100);
        assert!(pager.next());
        assert_eq!(pager.page(), Page::new(100, 100));

        // nothing known about the new window yet
        assert!(!pager.has_next());

        pager.observe(37);
        assert!(!pager.next());
        assert_eq!(pager.offset(), 100);
    }

    #[test]
    fn prev_floors_at_zero() {
        let mut pager = Pager::new(50).unwrap();
        assert!(!pager.prev());

        pager.seek(30);
        assert!(pager.prev());
        assert_eq!(pager.offset(), 0);
        assert!(!pager.has_prev());
    }

    #[test]
    fn set_limit_resets_offset() {
        let mut pager = Pager::new(50).unwrap();
        pager.observe(50);
        pager.next();
        pager.set_limit(25).unwrap();
        assert_eq!(pager.page(), Page::new(25, 0));
        assert!(!pager.has_next());
    }
}
