//! Search: parameter validation, query normalisation, highlighting, and
//! popular-term tracking.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::{self, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{EchoedQuery, Pagination, SearchOptions, SearchPage, SearchQuery};
use crate::repositories::RedisRepository;

pub const MAX_QUERY_CHARS: usize = 100;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 50;

/// Served when no search history is available.
pub const DEFAULT_POPULAR_TERMS: [&str; 20] = [
    "React",
    "Next.js",
    "TypeScript",
    "JavaScript",
    "CSS",
    "Node.js",
    "Python",
    "AI",
    "Machine Learning",
    "Web Development",
    "Frontend",
    "Backend",
    "Database",
    "GraphQL",
    "REST API",
    "Authentication",
    "Redux",
    "React Hooks",
    "Tailwind CSS",
    "Responsive Design",
];

fn issue(field: &str, message: &str) -> serde_json::Value {
    json!({ "field": field, "message": message })
}

fn parse_bounded(
    raw: Option<&str>,
    default: i64,
    min: i64,
    max: Option<i64>,
    field: &str,
    issues: &mut Vec<serde_json::Value>,
) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    match raw.parse::<i64>() {
        Ok(n) if n < min => {
            issues.push(issue(field, &format!("must be at least {min}")));
            default
        }
        Ok(n) if max.is_some_and(|m| n > m) => {
            issues.push(issue(field, &format!("must be at most {}", max.unwrap_or(n))));
            default
        }
        Ok(n) => n,
        Err(_) => {
            issues.push(issue(field, "must be a number"));
            default
        }
    }
}

/// Validate the raw query string into [`SearchOptions`].
pub fn validate_query(raw: &SearchQuery) -> AppResult<SearchOptions> {
    let mut issues = Vec::new();

    let query = raw.q.as_deref().map(str::trim).unwrap_or("");
    if query.is_empty() {
        issues.push(issue("q", "Please enter a search term."));
    } else if query.chars().count() > MAX_QUERY_CHARS {
        issues.push(issue("q", "Search terms must be 100 characters or fewer."));
    }
    let limit = parse_bounded(raw.limit.as_deref(), DEFAULT_LIMIT, 1, Some(MAX_LIMIT), "limit", &mut issues);
    let offset = parse_bounded(raw.offset.as_deref(), 0, 0, None, "offset", &mut issues);

    if !issues.is_empty() {
        return Err(AppError::InvalidParams {
            message: "Invalid request parameters".to_string(),
            details: serde_json::Value::Array(issues),
        });
    }

    let category = raw
        .category
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let tags = raw
        .tags
        .as_deref()
        .map(crate::services::posts::parse_tag_list)
        .filter(|t| !t.is_empty());

    Ok(SearchOptions {
        query: query.to_string(),
        limit,
        offset,
        category,
        tags,
    })
}

fn keep_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c.is_whitespace()
}

/// Lowercased word terms of a query; punctuation acts as a separator.
pub fn query_terms(query: &str) -> Vec<String> {
    let cleaned: String = query
        .trim()
        .chars()
        .map(|c| if keep_char(c) { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Prefix-matching `tsquery` text: `term:* | term:*`. Empty when no terms remain.
pub fn normalize_query(query: &str) -> String {
    query_terms(query)
        .iter()
        .map(|t| format!("{t}:*"))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// `%query%` for ILIKE, with LIKE metacharacters escaped.
pub fn like_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('%');
    for ch in query.trim().chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Lowercase `c` when that yields exactly one char, else keep it as is, so
/// folded text stays index-aligned with the original.
fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Escape `text` and wrap case-insensitive matches of each query term in `<mark>`.
/// Entities produced by escaping are never split by a match.
pub fn highlight(text: &str, query: &str) -> String {
    let term_chars: Vec<Vec<char>> = query
        .split_whitespace()
        .map(|t| escape_html(t).chars().map(fold_char).collect::<Vec<_>>())
        .filter(|t| !t.is_empty())
        .collect();
    let escaped = escape_html(text);
    if term_chars.is_empty() {
        return escaped;
    }

    let original: Vec<char> = escaped.chars().collect();
    let lower: Vec<char> = original.iter().copied().map(fold_char).collect();

    let mut out = String::with_capacity(escaped.len() + 32);
    let mut i = 0;
    while i < original.len() {
        if original[i] == '&' {
            let end = original[i..]
                .iter()
                .position(|&c| c == ';')
                .map_or(i + 1, |p| i + p + 1);
            out.extend(&original[i..end]);
            i = end;
            continue;
        }
        let hit = term_chars
            .iter()
            .filter(|t| !t.is_empty() && lower[i..].starts_with(t))
            .map(Vec::len)
            .max();
        match hit {
            Some(len) => {
                out.push_str("<mark class=\"search-hit\">");
                out.extend(&original[i..i + len]);
                out.push_str("</mark>");
                i += len;
            }
            None => {
                out.push(original[i]);
                i += 1;
            }
        }
    }
    out
}

/// Runs searches and tracks what people search for.
#[derive(Clone)]
pub struct SearchService {
    redis: Option<Arc<RedisRepository>>,
}

impl SearchService {
    pub fn new(redis: Option<Arc<RedisRepository>>) -> Self {
        Self { redis }
    }

    pub async fn search(&self, pool: &DbPool, opts: &SearchOptions) -> AppResult<SearchPage> {
        let (posts, total) = db::search_posts(pool, opts).await.map_err(|e| {
            warn!(error = %e, "search query failed");
            AppError::Search(e.to_string())
        })?;

        if opts.offset == 0 {
            self.record_term(&opts.query).await;
        }

        Ok(SearchPage {
            posts,
            pagination: Pagination::new(total, opts.limit, opts.offset),
            query: EchoedQuery {
                search_term: opts.query.clone(),
                category: opts.category.clone(),
                tags: opts.tags.clone(),
            },
        })
    }

    /// Count a search toward the popular-terms ranking. Best effort.
    pub async fn record_term(&self, query: &str) {
        let Some(redis) = &self.redis else { return };
        let term = query_terms(query).join(" ");
        if term.is_empty() {
            return;
        }
        if let Err(e) = redis.search_term_record(&term).await {
            debug!(error = %e, "failed to record search term");
        }
    }

    /// Most searched terms, or the default list when there is no history.
    pub async fn popular_terms(&self, limit: usize) -> Vec<String> {
        if let Some(redis) = &self.redis {
            match redis.search_terms_top(limit).await {
                Ok(terms) if !terms.is_empty() => return terms,
                Ok(_) => {}
                Err(e) => warn!(error = %e, "popular terms unavailable; using defaults"),
            }
        }
        DEFAULT_POPULAR_TERMS
            .iter()
            .take(limit)
            .map(|t| t.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(q: &str) -> SearchQuery {
        SearchQuery {
            q: Some(q.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn validate_applies_defaults() {
        let opts = validate_query(&raw("  rust  ")).unwrap();
        assert_eq!(opts.query, "rust");
        assert_eq!(opts.limit, DEFAULT_LIMIT);
        assert_eq!(opts.offset, 0);
        assert_eq!(opts.tags, None);
    }

    #[test]
    fn validate_rejects_empty_and_long_queries() {
        assert!(validate_query(&raw("   ")).is_err());
        assert!(validate_query(&raw(&"x".repeat(101))).is_err());
        assert!(validate_query(&raw(&"x".repeat(100))).is_ok());
    }

    #[test]
    fn validate_bounds_limit_and_offset() {
        let mut q = raw("rust");
        q.limit = Some("51".into());
        assert!(validate_query(&q).is_err());
        q.limit = Some("0".into());
        assert!(validate_query(&q).is_err());
        q.limit = Some("abc".into());
        assert!(validate_query(&q).is_err());
        q.limit = Some("50".into());
        q.offset = Some("-1".into());
        assert!(validate_query(&q).is_err());
        q.offset = Some("20".into());
        let opts = validate_query(&q).unwrap();
        assert_eq!((opts.limit, opts.offset), (50, 20));
    }

    #[test]
    fn validate_parses_tags_and_category() {
        let mut q = raw("rust");
        q.tags = Some("web, rust ,".into());
        q.category = Some(" ".into());
        let opts = validate_query(&q).unwrap();
        assert_eq!(opts.tags, Some(vec!["web".to_string(), "rust".to_string()]));
        assert_eq!(opts.category, None);
    }

    #[test]
    fn validation_error_lists_fields() {
        let mut q = raw("");
        q.limit = Some("100".into());
        match validate_query(&q).unwrap_err() {
            AppError::InvalidParams { details, .. } => {
                let fields: Vec<&str> = details
                    .as_array()
                    .unwrap()
                    .iter()
                    .filter_map(|d| d["field"].as_str())
                    .collect();
                assert_eq!(fields, vec!["q", "limit"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn normalize_builds_prefix_disjunction() {
        assert_eq!(normalize_query("  Rust,  Axum! "), "rust:* | axum:*");
        assert_eq!(normalize_query("러스트 웹"), "러스트:* | 웹:*");
        assert_eq!(normalize_query("!!! ???"), "");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern(" rust "), "%rust%");
    }

    #[test]
    fn highlight_escapes_then_marks() {
        assert_eq!(
            highlight("Learn <Rust> today", "rust"),
            "Learn &lt;<mark class=\"search-hit\">Rust</mark>&gt; today"
        );
        assert_eq!(highlight("a & b", ""), "a &amp; b");
    }

    #[test]
    fn highlight_marks_every_term_case_insensitively() {
        assert_eq!(
            highlight("Axum and RUST", "rust axum"),
            "<mark class=\"search-hit\">Axum</mark> and <mark class=\"search-hit\">RUST</mark>"
        );
    }

    #[test]
    fn highlight_survives_chars_whose_lowercase_grows() {
        assert_eq!(
            highlight("İstanbul Rust meetup", "rust"),
            "İstanbul <mark class=\"search-hit\">Rust</mark> meetup"
        );
        assert_eq!(
            highlight("Straße", "STRASSE straße"),
            "<mark class=\"search-hit\">Straße</mark>"
        );
    }

    #[test]
    fn highlight_does_not_inject_markup_from_query() {
        let out = highlight("<script>", "<script>");
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn popular_terms_fall_back_to_defaults() {
        let service = SearchService::new(None);
        let terms = service.popular_terms(3).await;
        assert_eq!(terms, vec!["React", "Next.js", "TypeScript"]);
    }
}
