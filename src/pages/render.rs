//! Template registry and the view models the templates render.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use handlebars::{Handlebars, TemplateError};
use serde::Serialize;
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::models::{Category, CategorySummary, Post, SearchHit, TagCount};
use crate::services::posts::{preview, reading_time_minutes, PREVIEW_CHARS};
use crate::services::search::highlight;

const TEMPLATES: [(&str, &str); 12] = [
    ("home", include_str!("../../templates/home.hbs")),
    ("blog_list", include_str!("../../templates/blog_list.hbs")),
    ("post", include_str!("../../templates/post.hbs")),
    ("search", include_str!("../../templates/search.hbs")),
    ("not_found", include_str!("../../templates/not_found.hbs")),
    ("error", include_str!("../../templates/error.hbs")),
    ("admin_dashboard", include_str!("../../templates/admin_dashboard.hbs")),
    ("admin_posts", include_str!("../../templates/admin_posts.hbs")),
    ("admin_edit", include_str!("../../templates/admin_edit.hbs")),
    ("login", include_str!("../../templates/login.hbs")),
    ("signup", include_str!("../../templates/signup.hbs")),
    ("reset_password", include_str!("../../templates/reset_password.hbs")),
];

pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    /// Compile every page template and the `layout` partial.
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_partial("layout", include_str!("../../templates/layout.hbs"))?;
        registry.register_partial("post_card", include_str!("../../templates/post_card.hbs"))?;
        registry.register_partial("pager", include_str!("../../templates/pager.hbs"))?;
        for (name, source) in TEMPLATES {
            registry.register_template_string(name, source)?;
        }
        Ok(Self { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> AppResult<String> {
        Ok(self.registry.render(name, data)?)
    }

    /// Render to an HTML response with `status`.
    pub fn page<T: Serialize>(&self, status: StatusCode, name: &str, data: &T) -> AppResult<Response> {
        Ok((status, Html(self.render(name, data)?)).into_response())
    }

    pub fn not_found(&self, nav: Nav) -> Response {
        let view = Simple {
            title: "Page not found".to_string(),
            nav,
        };
        self.page(StatusCode::NOT_FOUND, "not_found", &view)
            .unwrap_or_else(|e| e.into_response())
    }

    /// HTML rendering of an error; falls back to the JSON form if the error
    /// page itself cannot be rendered.
    pub fn error_page(&self, err: AppError, nav: Nav) -> Response {
        let status = err.status();
        if status.is_server_error() {
            error!(error = %err, "page failed");
        }
        let message = if status.is_server_error() {
            "Something went wrong. Please try again later.".to_string()
        } else {
            err.to_string()
        };
        let view = ErrorView {
            title: "Error".to_string(),
            nav,
            status: status.as_u16(),
            message,
        };
        match self.page(status, "error", &view) {
            Ok(response) => response,
            Err(_) => err.into_response(),
        }
    }
}

/// Signed-in state shown in the header.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Nav {
    pub signed_in: bool,
    pub email: Option<String>,
}

impl From<Option<&AuthUser>> for Nav {
    fn from(user: Option<&AuthUser>) -> Self {
        Self {
            signed_in: user.is_some(),
            email: user.map(|u| u.email.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Simple {
    pub title: String,
    pub nav: Nav,
}

#[derive(Debug, Serialize)]
struct ErrorView {
    title: String,
    nav: Nav,
    status: u16,
    message: String,
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%B %-d, %Y").to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub post_count: Option<i64>,
}

impl From<&CategorySummary> for CategoryView {
    fn from(c: &CategorySummary) -> Self {
        Self {
            name: c.name.clone(),
            slug: c.slug.clone(),
            color: c.color.clone(),
            post_count: None,
        }
    }
}

impl From<&Category> for CategoryView {
    fn from(c: &Category) -> Self {
        Self {
            name: c.name.clone(),
            slug: c.slug.clone(),
            color: c.color.clone(),
            post_count: c.post_count,
        }
    }
}

/// A post in a listing.
#[derive(Debug, Clone, Serialize)]
pub struct PostCard {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub preview: String,
    pub date: String,
    pub reading_time: usize,
    pub views: i64,
    pub tags: Vec<String>,
    pub category: Option<CategoryView>,
    pub image_url: Option<String>,
    pub alt_text: Option<String>,
    pub is_published: bool,
}

impl From<&Post> for PostCard {
    fn from(p: &Post) -> Self {
        Self {
            id: p.id,
            title: p.title.clone(),
            slug: p.slug.clone(),
            preview: preview(&p.content, PREVIEW_CHARS),
            date: format_date(p.published_at.unwrap_or(p.created_at)),
            reading_time: reading_time_minutes(&p.content),
            views: p.views,
            tags: p.tags.clone(),
            category: p.category.as_ref().map(CategoryView::from),
            image_url: p.image_url.clone(),
            alt_text: p.alt_text.clone(),
            is_published: p.is_published,
        }
    }
}

pub fn cards(posts: &[Post]) -> Vec<PostCard> {
    posts.iter().map(PostCard::from).collect()
}

/// A search hit with pre-escaped, highlighted title and preview.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHitView {
    pub slug: String,
    pub title_html: String,
    pub preview_html: String,
    pub date: Option<String>,
    pub author: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

impl SearchHitView {
    pub fn new(hit: &SearchHit, query: &str) -> Self {
        Self {
            slug: hit.slug.clone(),
            title_html: highlight(&hit.title, query),
            preview_html: highlight(&preview(&hit.content, PREVIEW_CHARS), query),
            date: hit.published_at.map(format_date),
            author: hit.author.name.clone(),
            category: hit.category.as_ref().map(|c| c.name.clone()),
            tags: hit.tags.clone(),
        }
    }
}

/// Paragraphs of plain-text content, split on blank lines.
pub fn paragraphs(content: &str) -> Vec<String> {
    content
        .replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Previous/next links for a numbered listing.
#[derive(Debug, Clone, Serialize)]
pub struct Pager {
    pub current: i64,
    pub total_pages: Option<i64>,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl Pager {
    /// `total` is `None` when unknown; then a full page implies a next one.
    pub fn new(base: &str, page: i64, per_page: i64, total: Option<i64>, shown: usize) -> Self {
        let page = page.max(1);
        let total_pages = total.map(|t| t.saturating_add(per_page - 1) / per_page);
        let has_next = match total_pages {
            Some(pages) => page < pages,
            None => shown as i64 >= per_page,
        };
        let url = |p: i64| format!("{}?page={}", base, p);
        Self {
            current: page,
            total_pages,
            prev_url: (page > 1).then(|| url(page - 1)),
            next_url: (has_next && page < i64::MAX).then(|| url(page + 1)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Sidebar {
    pub popular: Vec<PostCard>,
    pub tags: Vec<TagCount>,
    pub categories: Vec<CategoryView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn templates_compile() {
        assert!(Templates::new().is_ok());
    }

    #[test]
    fn layout_escapes_titles() {
        let templates = Templates::new().unwrap();
        let html = templates
            .render(
                "not_found",
                &Simple {
                    title: "<script>".to_string(),
                    nav: Nav::default(),
                },
            )
            .unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
    }

    #[test]
    fn error_page_shows_message() {
        let templates = Templates::new().unwrap();
        let html = templates
            .render(
                "error",
                &json!({ "title": "Error", "nav": {}, "status": 404, "message": "Missing" }),
            )
            .unwrap();
        assert!(html.contains("404"));
        assert!(html.contains("Missing"));
    }

    #[test]
    fn live_search_marks_raw_text_in_one_pass() {
        let templates = Templates::new().unwrap();
        let html = templates
            .render("search", &json!({ "title": "Search", "nav": {} }))
            .unwrap();
        assert!(html.contains("terms.join('|')"));
        assert!(html.contains("String(text).split(re)"));
        assert!(!html.contains("out = out.replace"));
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        assert_eq!(
            paragraphs("one\r\n\r\ntwo\n\n\n three "),
            vec!["one".to_string(), "two".to_string(), "three".to_string()]
        );
        assert!(paragraphs("  ").is_empty());
    }

    #[test]
    fn pager_links() {
        let p = Pager::new("/blog", 2, 20, Some(45), 20);
        assert_eq!(p.total_pages, Some(3));
        assert_eq!(p.prev_url.as_deref(), Some("/blog?page=1"));
        assert_eq!(p.next_url.as_deref(), Some("/blog?page=3"));

        let last = Pager::new("/blog", 3, 20, Some(45), 5);
        assert!(last.next_url.is_none());

        let unknown = Pager::new("/blog/tag/rust", 1, 12, None, 12);
        assert!(unknown.prev_url.is_none());
        assert_eq!(unknown.next_url.as_deref(), Some("/blog/tag/rust?page=2"));
    }

    #[test]
    fn pager_handles_huge_page_numbers() {
        let p = Pager::new("/blog", i64::MAX, 20, Some(i64::MAX), 0);
        assert!(p.next_url.is_none());
        assert_eq!(p.prev_url, Some(format!("/blog?page={}", i64::MAX - 1)));

        let unknown = Pager::new("/blog/tag/rust", i64::MAX, 12, None, 12);
        assert!(unknown.next_url.is_none());
    }

    #[test]
    fn dates_are_human_readable() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 9, 0, 0).unwrap();
        assert_eq!(format_date(at), "March 7, 2025");
    }
}
