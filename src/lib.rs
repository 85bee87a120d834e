//! Server-rendered blog with an admin CMS.
//!
//! Public pages and a JSON API over PostgreSQL, cookie-synced sessions for
//! the admin area, rate-limited search with optional Redis, and image uploads
//! to a local directory or S3.

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pages;
pub mod repositories;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use handlers::http::{self, method_not_allowed};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer};

use crate::config::UploadBackend;
use crate::storage::LOCAL_URL_PREFIX;

/// Build the full router (pages, JSON API, uploads). Used by main and by integration tests.
pub fn create_app(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route(
            "/refresh",
            post(auth::refresh).get(|| async {
                method_not_allowed("POST", "Method not allowed. Use POST to refresh the session.")
            }),
        )
        .route(
            "/signout",
            post(auth::signout)
                .get(auth::signout_get)
                .options(auth::signout_options),
        )
        .route(
            "/status",
            get(auth::status).post(|| async {
                method_not_allowed("GET", "Method not allowed. Use GET to check auth status.")
            }),
        )
        .route(
            "/test",
            get(auth::self_check).post(|| async {
                method_not_allowed("GET", "Method not allowed. Use GET for health check.")
            }),
        );

    let admin_api = Router::new()
        .route(
            "/posts",
            get(dashboard::list_posts).post(dashboard::create_post),
        )
        .route(
            "/posts/:id",
            get(dashboard::get_post)
                .put(dashboard::update_post)
                .delete(dashboard::delete_post),
        )
        .route("/stats", get(dashboard::get_stats))
        .route("/categories", post(dashboard::create_category));

    let api = Router::new()
        .route("/categories", get(handlers::posts::list_categories))
        .route("/tags", get(handlers::posts::list_tags))
        .route("/posts/popular", get(handlers::posts::popular_posts))
        .route("/posts/:id/views", post(handlers::posts::record_view))
        .route(
            "/search",
            get(handlers::search::search)
                .post(handlers::search::search_post)
                .options(handlers::search::search_options),
        )
        .route("/search/popular", get(handlers::search::popular_terms))
        .route("/search/suggest", get(handlers::search::suggest))
        .route(
            "/upload/image",
            post(handlers::upload::upload_image)
                .layer(DefaultBodyLimit::max(handlers::upload::UPLOAD_BODY_LIMIT)),
        )
        .nest("/auth", auth_routes)
        .nest("/admin", admin_api);

    let page_routes = Router::new()
        .route("/", get(pages::blog::home))
        .route("/blog", get(pages::blog::blog_index))
        .route("/blog/:slug", get(pages::blog::post_detail))
        .route("/blog/category/:slug", get(pages::blog::category_posts))
        .route("/blog/tag/:tag", get(pages::blog::tag_posts))
        .route("/search", get(pages::blog::search_page))
        .route("/admin", get(pages::admin::dashboard))
        .route("/admin/posts", get(pages::admin::posts))
        .route("/admin/posts/new", get(pages::admin::new_post))
        .route("/admin/posts/:id/edit", get(pages::admin::edit_post))
        .route(
            "/auth/login",
            get(pages::auth::login_page).post(pages::auth::login_submit),
        )
        .route(
            "/auth/signup",
            get(pages::auth::signup_page).post(pages::auth::signup_submit),
        )
        .route("/auth/reset-password", get(pages::auth::reset_password_page));

    let mut app = Router::new()
        .route("/health", get(http::health))
        .nest("/api", api)
        .merge(page_routes);

    if let UploadBackend::Local { dir } = state.config().upload_backend() {
        let uploads = ServiceBuilder::new()
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .service(ServeDir::new(dir));
        app = app.nest_service(LOCAL_URL_PREFIX, uploads);
    }

    app.layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::session_sync,
    ))
    .with_state(state)
}
