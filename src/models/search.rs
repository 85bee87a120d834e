//! Search request and result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw `GET /api/search` query string; validated into [`SearchOptions`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
}

/// Validated search options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub query: String,
    pub limit: i64,
    pub offset: i64,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchAuthor {
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchCategory {
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub published_at: Option<DateTime<Utc>>,
    pub author: SearchAuthor,
    pub category: Option<SearchCategory>,
    pub tags: Vec<String>,
    pub views: i64,
    pub image_url: Option<String>,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
    pub total_pages: i64,
    pub current_page: i64,
}

impl Pagination {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        let limit = limit.max(1);
        Self {
            total,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total,
            total_pages: total.saturating_add(limit - 1) / limit,
            current_page: (offset / limit).saturating_add(1),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoedQuery {
    pub search_term: String,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub posts: Vec<SearchHit>,
    pub pagination: Pagination,
    pub query: EchoedQuery,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_math() {
        let p = Pagination::new(25, 10, 10);
        assert!(p.has_more);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.current_page, 2);

        let last = Pagination::new(25, 10, 20);
        assert!(!last.has_more);
        assert_eq!(last.current_page, 3);

        let empty = Pagination::new(0, 10, 0);
        assert!(!empty.has_more);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn pagination_saturates_at_the_far_end() {
        let far = Pagination::new(3, 10, i64::MAX);
        assert!(!far.has_more);
        assert_eq!(far.current_page, i64::MAX / 10 + 1);

        let single = Pagination::new(i64::MAX, 1, i64::MAX);
        assert!(!single.has_more);
        assert_eq!(single.current_page, i64::MAX);
        assert_eq!(single.total_pages, i64::MAX);
    }
}
