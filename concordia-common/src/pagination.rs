//! Pagination utilities
//!
//! Listing endpoints accept `page` / `per_page`; `per_page` is always clamped
//! to a server-side maximum regardless of what the client asks for.

use serde::Serialize;

/// `per_page` used when the client does not ask for one
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Upper bound on `per_page`
pub const MAX_PAGE_SIZE: i64 = 23;

/// Page requested by a client, before clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number (1-indexed)
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self { page, per_page }
    }

    /// Clamp `per_page` into `[1, max_page_size]`
    pub fn clamped(self, max_page_size: i64) -> Self {
        Self {
            page: self.page,
            per_page: self.per_page.clamp(1, max_page_size.max(1)),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

impl Pagination {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Calculate pagination metadata from total results and requested page
///
/// Ensures page is within valid bounds [1, total_pages]. `per_page` must
/// already be clamped; values below 1 are treated as 1.
///
/// # Examples
/// ```
/// use concordia_common::pagination::calculate_pagination;
///
/// // 45 results at 23 per page = 2 pages (23 + 22)
/// let p = calculate_pagination(45, 2, 23);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 2);
/// assert_eq!(p.offset, 23);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(45, 99, 23);
/// assert_eq!(p.page, 2);
/// ```
pub fn calculate_pagination(total_count: i64, requested_page: i64, per_page: i64) -> Pagination {
    let per_page = per_page.max(1);
    let total_pages = (total_count + per_page - 1) / per_page;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * per_page;

    Pagination {
        page,
        per_page,
        total_count,
        total_pages,
        offset,
    }
}

/// Pagination block serialized alongside listing results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page: Option<i64>,
    pub previous_page: Option<i64>,
}

impl From<Pagination> for PageInfo {
    fn from(p: Pagination) -> Self {
        Self {
            page: p.page,
            per_page: p.per_page,
            total_count: p.total_count,
            total_pages: p.total_pages,
            has_next: p.has_next(),
            has_previous: p.has_previous(),
            next_page: p.has_next().then_some(p.page + 1),
            previous_page: p.has_previous().then_some(p.page - 1),
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub objects: Vec<T>,
    pub pagination: PageInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_first_page() {
        let p = calculate_pagination(45, 1, 23);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 2);
        assert_eq!(p.offset, 0);
        assert!(p.has_next());
        assert!(!p.has_previous());
    }

    #[test]
    fn test_pagination_last_page() {
        let p = calculate_pagination(45, 2, 23);
        assert_eq!(p.offset, 23);
        assert!(!p.has_next());
        assert!(p.has_previous());
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = calculate_pagination(45, 0, 10);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 3, 10);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
        assert!(!p.has_next());
    }

    #[test]
    fn test_pagination_exact_page_boundary() {
        let p = calculate_pagination(46, 2, 23);
        assert_eq!(p.total_pages, 2);
        assert!(!p.has_next());
    }

    #[test]
    fn test_request_clamped_to_maximum() {
        let r = PageRequest::new(1, 1000).clamped(MAX_PAGE_SIZE);
        assert_eq!(r.per_page, MAX_PAGE_SIZE);

        let r = PageRequest::new(1, 0).clamped(MAX_PAGE_SIZE);
        assert_eq!(r.per_page, 1);
    }

    #[test]
    fn test_page_info_links() {
        let info = PageInfo::from(calculate_pagination(45, 2, 10));
        assert_eq!(info.next_page, Some(3));
        assert_eq!(info.previous_page, Some(1));
        assert_eq!(info.total_pages, 5);
    }
}
