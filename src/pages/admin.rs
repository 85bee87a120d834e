//! Admin pages. The session guard redirects anonymous visitors before these run.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use serde::Serialize;
use uuid::Uuid;

use crate::db::{categories_list_with_counts, post_get_by_id, post_stats, posts_list_all};
use crate::handlers::http::AppState;
use crate::handlers::posts::parse_post_id;
use crate::middleware::auth::AuthUser;
use crate::models::{Category, Post, PostStats};
use crate::pages::blog::respond;
use crate::pages::render::{cards, Nav, PostCard};

const RECENT_POSTS: usize = 5;

#[derive(Serialize)]
struct DashboardView {
    title: String,
    nav: Nav,
    stats: PostStats,
    recent: Vec<PostCard>,
}

#[derive(Serialize)]
struct PostsView {
    title: String,
    nav: Nav,
    posts: Vec<PostCard>,
}

#[derive(Debug, Default, Serialize)]
struct PostForm {
    title: String,
    slug: String,
    content: String,
    tags: String,
    image_url: String,
    alt_text: String,
    is_published: bool,
}

impl From<&Post> for PostForm {
    fn from(p: &Post) -> Self {
        Self {
            title: p.title.clone(),
            slug: p.slug.clone(),
            content: p.content.clone(),
            tags: p.tags.join(", "),
            image_url: p.image_url.clone().unwrap_or_default(),
            alt_text: p.alt_text.clone().unwrap_or_default(),
            is_published: p.is_published,
        }
    }
}

#[derive(Serialize)]
struct CategoryOption {
    id: Uuid,
    name: String,
    selected: bool,
}

#[derive(Serialize)]
struct EditView {
    title: String,
    nav: Nav,
    heading: String,
    post_id: Option<i64>,
    form: PostForm,
    categories: Vec<CategoryOption>,
}

fn category_options(categories: &[Category], selected: Option<Uuid>) -> Vec<CategoryOption> {
    categories
        .iter()
        .map(|c| CategoryOption {
            id: c.id,
            name: c.name.clone(),
            selected: Some(c.id) == selected,
        })
        .collect()
}

/// GET /admin
pub async fn dashboard(State(state): State<AppState>, user: AuthUser) -> Response {
    let nav = Nav::from(Some(&user));
    let result = async {
        let stats = post_stats(state.db()).await?;
        let posts = posts_list_all(state.db()).await?;
        let recent: Vec<Post> = posts.into_iter().take(RECENT_POSTS).collect();
        let view = DashboardView {
            title: "Dashboard".to_string(),
            nav: nav.clone(),
            stats,
            recent: cards(&recent),
        };
        state.templates().page(StatusCode::OK, "admin_dashboard", &view)
    }
    .await;
    respond(&state, nav, result)
}

/// GET /admin/posts
pub async fn posts(State(state): State<AppState>, user: AuthUser) -> Response {
    let nav = Nav::from(Some(&user));
    let result = async {
        let posts = posts_list_all(state.db()).await?;
        let view = PostsView {
            title: "Posts".to_string(),
            nav: nav.clone(),
            posts: cards(&posts),
        };
        state.templates().page(StatusCode::OK, "admin_posts", &view)
    }
    .await;
    respond(&state, nav, result)
}

/// GET /admin/posts/new
pub async fn new_post(State(state): State<AppState>, user: AuthUser) -> Response {
    let nav = Nav::from(Some(&user));
    let result = async {
        let categories = categories_list_with_counts(state.db()).await?;
        let view = EditView {
            title: "New post".to_string(),
            nav: nav.clone(),
            heading: "New post".to_string(),
            post_id: None,
            form: PostForm::default(),
            categories: category_options(&categories, None),
        };
        state.templates().page(StatusCode::OK, "admin_edit", &view)
    }
    .await;
    respond(&state, nav, result)
}

/// GET /admin/posts/:id/edit
pub async fn edit_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Response {
    let nav = Nav::from(Some(&user));
    let result = async {
        let id = parse_post_id(&id)?;
        let Some(post) = post_get_by_id(state.db(), id).await? else {
            return Ok(state.templates().not_found(nav.clone()));
        };
        let categories = categories_list_with_counts(state.db()).await?;
        let view = EditView {
            title: format!("Edit: {}", post.title),
            nav: nav.clone(),
            heading: "Edit post".to_string(),
            post_id: Some(post.id),
            form: PostForm::from(&post),
            categories: category_options(&categories, post.category_id),
        };
        state.templates().page(StatusCode::OK, "admin_edit", &view)
    }
    .await;
    respond(&state, nav, result)
}
