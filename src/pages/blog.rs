//! Public pages: home, listings, post detail, search.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::db::{
    categories_list_with_counts, category_find_by_slug, post_find_published_by_slug,
    posts_count_published, posts_list_by_category, posts_list_by_tag, posts_list_published,
    posts_popular, posts_related_candidates, tags_with_counts,
};
use crate::error::{AppError, AppResult};
use crate::handlers::http::AppState;
use crate::middleware::auth::MaybeUser;
use crate::models::SearchQuery;
use crate::pages::render::{
    cards, paragraphs, CategoryView, Nav, Pager, PostCard, SearchHitView, Sidebar,
};
use crate::services::posts::{rank_related, RELATED_LIMIT};
use crate::services::search::validate_query;

const HOME_POSTS: i64 = 6;
const BLOG_PAGE_SIZE: i64 = 20;
const CATEGORY_PAGE_SIZE: i64 = 12;
const SIDEBAR_POPULAR: i64 = 5;
const SEARCH_POPULAR_TERMS: usize = 8;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1)
    }
}

#[derive(Serialize)]
struct HomeView {
    title: String,
    nav: Nav,
    posts: Vec<PostCard>,
    sidebar: Sidebar,
}

#[derive(Serialize)]
struct ListView {
    title: String,
    nav: Nav,
    heading: String,
    description: Option<String>,
    posts: Vec<PostCard>,
    pager: Pager,
}

#[derive(Serialize)]
struct PostView {
    title: String,
    nav: Nav,
    post: PostCard,
    paragraphs: Vec<String>,
    related: Vec<PostCard>,
}

#[derive(Serialize)]
struct SearchView {
    title: String,
    nav: Nav,
    query: String,
    hits: Vec<SearchHitView>,
    total: Option<i64>,
    error: Option<String>,
    popular: Vec<String>,
}

/// Turn a page result into a response, rendering errors as HTML.
pub(crate) fn respond(state: &AppState, nav: Nav, result: AppResult<Response>) -> Response {
    match result {
        Ok(response) => response,
        Err(e) => state.templates().error_page(e, nav),
    }
}

/// GET /
pub async fn home(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    let nav = Nav::from(user.as_ref());
    let result = async {
        let db = state.db();
        let posts = posts_list_published(db, 1, HOME_POSTS).await?;
        let sidebar = Sidebar {
            popular: cards(&posts_popular(db, SIDEBAR_POPULAR).await?),
            tags: tags_with_counts(db).await?,
            categories: categories_list_with_counts(db)
                .await?
                .iter()
                .map(CategoryView::from)
                .collect(),
        };
        let view = HomeView {
            title: "Home".to_string(),
            nav: nav.clone(),
            posts: cards(&posts),
            sidebar,
        };
        state.templates().page(StatusCode::OK, "home", &view)
    }
    .await;
    respond(&state, nav, result)
}

/// GET /blog?page=
pub async fn blog_index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Response {
    let nav = Nav::from(user.as_ref());
    let page = query.page();
    let result = async {
        let posts = posts_list_published(state.db(), page, BLOG_PAGE_SIZE).await?;
        let total = posts_count_published(state.db()).await?;
        let view = ListView {
            title: "Blog".to_string(),
            nav: nav.clone(),
            heading: "All posts".to_string(),
            description: None,
            pager: Pager::new("/blog", page, BLOG_PAGE_SIZE, Some(total), posts.len()),
            posts: cards(&posts),
        };
        state.templates().page(StatusCode::OK, "blog_list", &view)
    }
    .await;
    respond(&state, nav, result)
}

/// GET /blog/:slug
pub async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
) -> Response {
    let nav = Nav::from(user.as_ref());
    let result = async {
        let Some(post) = post_find_published_by_slug(state.db(), &slug).await? else {
            return Ok(state.templates().not_found(nav.clone()));
        };
        let candidates = posts_related_candidates(state.db(), &post).await?;
        let related = rank_related(&post, candidates, RELATED_LIMIT);
        let view = PostView {
            title: post.title.clone(),
            nav: nav.clone(),
            paragraphs: paragraphs(&post.content),
            post: PostCard::from(&post),
            related: cards(&related),
        };
        state.templates().page(StatusCode::OK, "post", &view)
    }
    .await;
    respond(&state, nav, result)
}

/// GET /blog/category/:slug?page=
pub async fn category_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let nav = Nav::from(user.as_ref());
    let page = query.page();
    let result = async {
        let Some(category) = category_find_by_slug(state.db(), &slug).await? else {
            return Ok(state.templates().not_found(nav.clone()));
        };
        let posts = posts_list_by_category(state.db(), &slug, page, CATEGORY_PAGE_SIZE).await?;
        let view = ListView {
            title: category.name.clone(),
            nav: nav.clone(),
            heading: category.name.clone(),
            description: category.description.clone(),
            pager: Pager::new(
                &format!("/blog/category/{}", category.slug),
                page,
                CATEGORY_PAGE_SIZE,
                Some(category.post_count.unwrap_or(0)),
                posts.len(),
            ),
            posts: cards(&posts),
        };
        state.templates().page(StatusCode::OK, "blog_list", &view)
    }
    .await;
    respond(&state, nav, result)
}

/// GET /blog/tag/:tag?page=
pub async fn tag_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(tag): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let nav = Nav::from(user.as_ref());
    let page = query.page();
    let result = async {
        let posts = posts_list_by_tag(state.db(), &tag, page, CATEGORY_PAGE_SIZE).await?;
        if posts.is_empty() && page == 1 {
            return Ok(state.templates().not_found(nav.clone()));
        }
        let view = ListView {
            title: format!("#{}", tag),
            nav: nav.clone(),
            heading: format!("Posts tagged #{}", tag),
            description: None,
            pager: Pager::new(
                &format!("/blog/tag/{}", tag),
                page,
                CATEGORY_PAGE_SIZE,
                None,
                posts.len(),
            ),
            posts: cards(&posts),
        };
        state.templates().page(StatusCode::OK, "blog_list", &view)
    }
    .await;
    respond(&state, nav, result)
}

/// GET /search?q=: first page rendered on the server; the page script
/// takes over as the user types.
pub async fn search_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(raw): Query<SearchQuery>,
) -> Response {
    let nav = Nav::from(user.as_ref());
    let query = raw.q.as_deref().map(str::trim).unwrap_or_default().to_string();
    let popular = state.search().popular_terms(SEARCH_POPULAR_TERMS).await;

    let mut view = SearchView {
        title: "Search".to_string(),
        nav: nav.clone(),
        query: query.clone(),
        hits: Vec::new(),
        total: None,
        error: None,
        popular,
    };

    if !query.is_empty() {
        match validate_query(&raw) {
            Ok(opts) => match state.search().search(state.db(), &opts).await {
                Ok(page) => {
                    view.total = Some(page.pagination.total);
                    view.hits = page
                        .posts
                        .iter()
                        .map(|hit| SearchHitView::new(hit, &opts.query))
                        .collect();
                }
                Err(_) => {
                    view.error =
                        Some("The search service is temporarily unavailable.".to_string())
                }
            },
            Err(AppError::InvalidParams { message, .. }) => view.error = Some(message),
            Err(e) => view.error = Some(e.to_string()),
        }
    }

    let result = state.templates().page(StatusCode::OK, "search", &view);
    respond(&state, nav, result)
}
