//! Post rules shared by the admin API and the pages: slugs, publish state,
//! partial updates, reading time, previews, related-post ranking.

use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::{CreatePostRequest, Post, PostWrite, UpdatePostRequest};

const WORDS_PER_MINUTE: usize = 200;
pub const PREVIEW_CHARS: usize = 120;
pub const RELATED_LIMIT: usize = 3;

/// URL slug from a title. Letters and digits (any script) are kept lowercase;
/// every other run of characters becomes a single `-`.
pub fn slugify(title: &str) -> AppResult<String> {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        return Err(AppError::Validation(
            "Slug must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(slug)
}

/// Trim tags, drop empties and duplicates, keep first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Tags from a comma-separated form field.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(','))
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Column values for a new post. Publishing without a date stamps `now`.
pub fn build_create(req: CreatePostRequest, now: DateTime<Utc>) -> AppResult<PostWrite> {
    let slug = match non_empty(req.slug.as_ref()) {
        Some(slug) => slugify(slug)?,
        None => slugify(&req.title)?,
    };
    let published_at = match (req.is_published, req.published_at) {
        (true, None) => Some(now),
        (_, explicit) => explicit,
    };
    Ok(PostWrite {
        title: req.title.trim().to_string(),
        content: req.content,
        slug,
        category_id: req.category_id,
        published_at,
        is_published: req.is_published,
        tags: normalize_tags(&req.tags),
        image_url: clean_optional(req.image_url),
        alt_text: clean_optional(req.alt_text),
    })
}

/// `published_at` after an update; `None` leaves the stored value alone.
///
/// An explicit date in the update is used, except that unpublishing always
/// clears it. Publishing a post that never had a date stamps `now`.
pub fn resolve_published_at(
    existing_is_published: bool,
    existing_published_at: Option<DateTime<Utc>>,
    update_is_published: Option<bool>,
    update_published_at: Option<Option<DateTime<Utc>>>,
    now: DateTime<Utc>,
) -> Option<Option<DateTime<Utc>>> {
    let mut published_at = update_published_at;
    if update_is_published == Some(true)
        && !existing_is_published
        && existing_published_at.is_none()
        && published_at.is_none()
    {
        published_at = Some(Some(now));
    }
    if update_is_published == Some(false) && existing_is_published {
        published_at = Some(None);
    }
    published_at
}

/// Merge a partial update into the stored post.
pub fn apply_update(existing: &Post, req: UpdatePostRequest, now: DateTime<Utc>) -> AppResult<PostWrite> {
    let published_at = resolve_published_at(
        existing.is_published,
        existing.published_at,
        req.is_published,
        req.published_at,
        now,
    )
    .unwrap_or(existing.published_at);

    let slug = match non_empty(req.slug.as_ref()) {
        Some(slug) => slugify(slug)?,
        None => existing.slug.clone(),
    };
    let tags = match req.tags {
        Some(tags) => normalize_tags(&tags),
        None => existing.tags.clone(),
    };

    Ok(PostWrite {
        title: non_empty(req.title.as_ref())
            .map(str::to_string)
            .unwrap_or_else(|| existing.title.clone()),
        content: req
            .content
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| existing.content.clone()),
        slug,
        category_id: req.category_id.unwrap_or(existing.category_id),
        published_at,
        is_published: req.is_published.unwrap_or(existing.is_published),
        tags,
        image_url: match req.image_url {
            Some(v) => clean_optional(v),
            None => existing.image_url.clone(),
        },
        alt_text: match req.alt_text {
            Some(v) => clean_optional(v),
            None => existing.alt_text.clone(),
        },
    })
}

/// Minutes to read at 200 words per minute, at least one.
pub fn reading_time_minutes(content: &str) -> usize {
    let words = content.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1)
}

/// First `max_chars` characters, with `...` appended when truncated.
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((idx, _)) => format!("{}...", &content[..idx]),
    }
}

/// Order candidates by shared-tag count, then views; drop `current`; keep `limit`.
pub fn rank_related(current: &Post, candidates: Vec<Post>, limit: usize) -> Vec<Post> {
    let mut scored: Vec<(usize, Post)> = candidates
        .into_iter()
        .filter(|p| p.id != current.id)
        .map(|p| {
            let score = p.tags.iter().filter(|t| current.tags.contains(t)).count();
            (score, p)
        })
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(b.views.cmp(&a.views)));
    scored.into_iter().take(limit).map(|(_, p)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn post(id: i64, tags: &[&str], views: i64) -> Post {
        Post {
            id,
            created_at: now(),
            updated_at: now(),
            title: format!("Post {id}"),
            content: "body".to_string(),
            slug: format!("post-{id}"),
            author_id: Uuid::nil(),
            category_id: None,
            published_at: None,
            is_published: false,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            views,
            image_url: None,
            alt_text: None,
            category: None,
        }
    }

    fn create(title: &str, is_published: bool) -> CreatePostRequest {
        CreatePostRequest {
            title: title.to_string(),
            content: "content".to_string(),
            slug: None,
            category_id: None,
            published_at: None,
            is_published,
            tags: vec![" rust ".into(), "web".into(), "rust".into(), "".into()],
            image_url: Some("  ".into()),
            alt_text: None,
        }
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Hello, World!! ").unwrap(), "hello-world");
        assert_eq!(slugify("Next.js 15 & React").unwrap(), "next-js-15-react");
        assert_eq!(slugify("러스트 블로그 시작").unwrap(), "러스트-블로그-시작");
        assert!(slugify("!!!").is_err());
    }

    #[test]
    fn create_published_without_date_stamps_now() {
        let write = build_create(create("First Post", true), now()).unwrap();
        assert_eq!(write.published_at, Some(now()));
        assert_eq!(write.slug, "first-post");
        assert_eq!(write.tags, vec!["rust", "web"]);
        assert_eq!(write.image_url, None);
    }

    #[test]
    fn create_draft_keeps_no_date() {
        let write = build_create(create("Draft", false), now()).unwrap();
        assert_eq!(write.published_at, None);
        assert!(!write.is_published);
    }

    #[test]
    fn publishing_a_never_published_draft_stamps_now() {
        let r = resolve_published_at(false, None, Some(true), None, now());
        assert_eq!(r, Some(Some(now())));
    }

    #[test]
    fn republishing_keeps_original_date() {
        let earlier = now() - chrono::Duration::days(3);
        let r = resolve_published_at(false, Some(earlier), Some(true), None, now());
        assert_eq!(r, None);
    }

    #[test]
    fn unpublishing_clears_date_even_if_given() {
        let r = resolve_published_at(true, Some(now()), Some(false), Some(Some(now())), now());
        assert_eq!(r, Some(None));
    }

    #[test]
    fn apply_update_ignores_empty_text_and_clears_nulls() {
        let mut existing = post(7, &["a"], 10);
        existing.image_url = Some("https://cdn/x.png".into());
        existing.alt_text = Some("x".into());
        let update = UpdatePostRequest {
            title: Some("   ".into()),
            content: Some("new body".into()),
            image_url: Some(None),
            ..Default::default()
        };
        let write = apply_update(&existing, update, now()).unwrap();
        assert_eq!(write.title, "Post 7");
        assert_eq!(write.content, "new body");
        assert_eq!(write.image_url, None);
        assert_eq!(write.alt_text.as_deref(), Some("x"));
        assert_eq!(write.tags, vec!["a"]);
        assert_eq!(write.slug, "post-7");
    }

    #[test]
    fn apply_update_replaces_or_clears_tags_when_present() {
        let existing = post(3, &["rust"], 0);
        let cleared = UpdatePostRequest {
            tags: Some(vec![]),
            ..Default::default()
        };
        assert!(apply_update(&existing, cleared, now()).unwrap().tags.is_empty());

        let replaced = UpdatePostRequest {
            tags: Some(vec![" web ".into(), "".into()]),
            ..Default::default()
        };
        assert_eq!(apply_update(&existing, replaced, now()).unwrap().tags, vec!["web"]);

        let untouched = apply_update(&existing, UpdatePostRequest::default(), now()).unwrap();
        assert_eq!(untouched.tags, vec!["rust"]);
    }

    #[test]
    fn reading_time_rounds_up() {
        assert_eq!(reading_time_minutes(""), 1);
        assert_eq!(reading_time_minutes(&"word ".repeat(200)), 1);
        assert_eq!(reading_time_minutes(&"word ".repeat(201)), 2);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 120), "short");
        assert_eq!(preview("가나다라", 2), "가나...");
        assert_eq!(preview(&"a".repeat(121), 120), format!("{}...", "a".repeat(120)));
    }

    #[test]
    fn related_ranks_by_shared_tags_then_views() {
        let current = post(1, &["rust", "web", "axum"], 0);
        let candidates = vec![
            post(1, &["rust"], 999),
            post(2, &["rust"], 50),
            post(3, &["rust", "web"], 5),
            post(4, &["rust"], 80),
            post(5, &[], 1000),
        ];
        let ids: Vec<i64> = rank_related(&current, candidates, RELATED_LIMIT)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![3, 4, 2]);
    }

    #[test]
    fn parse_tag_list_splits_commas() {
        assert_eq!(parse_tag_list("rust, web ,,rust"), vec!["rust", "web"]);
    }
}
