// Shared cursor-paginated response envelope.
//
// Every listing queries limit+1 rows to detect whether a further page exists
// without a COUNT, then trims back down to limit here.

use serde::Serialize;

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Clamp a client-supplied page limit into 1..=100, defaulting to 20.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    match limit {
        Some(l) => l.clamp(1, MAX_PAGE_LIMIT),
        None => DEFAULT_PAGE_LIMIT,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Build a page from `limit + 1` fetched items. When more than `limit`
    /// rows came back the page is trimmed and `next_cursor` is derived from
    /// the last kept item.
    pub fn paginate<F>(mut items: Vec<T>, limit: usize, cursor_of: F) -> Self
    where
        F: Fn(&T) -> String,
    {
        let has_more = items.len() > limit;
        if has_more {
            items.truncate(limit);
        }

        let next_cursor = if has_more {
            items.last().map(&cursor_of)
        } else {
            None
        };

        Page {
            items,
            next_cursor,
            has_more,
        }
    }

    pub fn empty() -> Self {
        Page {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_overfetched_page_and_builds_cursor() {
        let page = Page::paginate(vec![3, 2, 1], 2, |n| format!("c{}", n));
        assert_eq!(page.items, vec![3, 2]);
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("c2"));
    }

    #[test]
    fn exact_page_has_no_next_cursor() {
        let page = Page::paginate(vec![3, 2], 2, |n| format!("c{}", n));
        assert_eq!(page.items, vec![3, 2]);
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn limit_clamping() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(250)), 100);
        assert_eq!(clamp_limit(Some(7)), 7);
    }
}
