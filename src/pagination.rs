//! Page-number pagination with a `{count, next, previous, results}`
//! envelope. Default page size 20, client-adjustable via `page_size`,
//! hard cap 200.

use crate::error::ApiError;
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Serialize)]
pub struct Page<T> {
    /// Total number of items across all pages, not the page's length.
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Clamp a requested page size into [1, MAX_PAGE_SIZE].
pub fn clamp_page_size(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Slice out one page. Pages are 1-based; an empty collection still has
/// a valid first page. A page past the end is a NotFound, not an empty
/// list. `link` renders the URL for a given page number.
pub fn paginate<T>(
    items: Vec<T>,
    page: usize,
    page_size: usize,
    link: impl Fn(usize) -> String,
) -> Result<Page<T>, ApiError> {
    let count = items.len();
    let total_pages = count.div_ceil(page_size).max(1);

    if page == 0 || page > total_pages {
        return Err(ApiError::NotFound("page"));
    }

    let start = (page - 1) * page_size;
    let results: Vec<T> = items.into_iter().skip(start).take(page_size).collect();

    Ok(Page {
        count,
        next: (page < total_pages).then(|| link(page + 1)),
        previous: (page > 1).then(|| link(page - 1)),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(page: usize) -> String {
        format!("/api/subtasks/?page={page}&page_size=5")
    }

    #[test]
    fn twelve_items_page_size_five_is_three_pages() {
        let items: Vec<u32> = (0..12).collect();

        let p1 = paginate(items.clone(), 1, 5, link).unwrap();
        assert_eq!(p1.count, 12);
        assert_eq!(p1.results, vec![0, 1, 2, 3, 4]);
        assert!(p1.previous.is_none());
        assert_eq!(p1.next.as_deref(), Some("/api/subtasks/?page=2&page_size=5"));

        let p2 = paginate(items.clone(), 2, 5, link).unwrap();
        assert_eq!(p2.count, 12);
        assert_eq!(p2.results, vec![5, 6, 7, 8, 9]);
        assert_eq!(p2.previous.as_deref(), Some("/api/subtasks/?page=1&page_size=5"));

        let p3 = paginate(items.clone(), 3, 5, link).unwrap();
        assert_eq!(p3.count, 12);
        assert_eq!(p3.results, vec![10, 11]);
        assert!(p3.next.is_none());

        assert!(matches!(paginate(items, 4, 5, link), Err(ApiError::NotFound("page"))));
    }

    #[test]
    fn empty_collection_has_one_valid_page() {
        let page = paginate(Vec::<u32>::new(), 1, 20, link).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
        assert!(page.next.is_none());
        assert!(page.previous.is_none());

        assert!(paginate(Vec::<u32>::new(), 2, 20, link).is_err());
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(clamp_page_size(None), 20);
        assert_eq!(clamp_page_size(Some(5)), 5);
        assert_eq!(clamp_page_size(Some(0)), 1);
        assert_eq!(clamp_page_size(Some(1000)), 200);
    }
}
