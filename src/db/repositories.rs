//! Repositories: users, refresh sessions, categories, posts, search.

use crate::error::{conflict_on_unique, AppError, AppResult};
use crate::models::{
    Category, CategorySummary, Post, PostStats, PostWrite, SearchAuthor, SearchCategory,
    SearchHit, SearchOptions, TagCount,
};
use crate::services::search::{like_pattern, normalize_query};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;

// ---- User ----

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

const USER_COLUMNS: &str =
    "id, email, password_hash, name, avatar_url, bio, created_at, last_sign_in_at";

pub async fn user_create(
    pool: &DbPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<UserRow> {
    let sql = format!(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
    );
    sqlx::query_as::<_, UserRow>(&sql)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Email already registered"))
}

pub async fn user_find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn user_get_by_id(pool: &DbPool, id: Uuid) -> AppResult<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn user_touch_sign_in(pool: &DbPool, id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE users SET last_sign_in_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---- Refresh sessions (only the SHA-256 of the token is stored) ----

pub async fn refresh_session_create(
    pool: &DbPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO refresh_sessions (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Atomically revoke an active refresh session and return its owner.
/// `None` when the token is unknown, expired, or already used.
pub async fn refresh_session_consume(pool: &DbPool, token_hash: &str) -> AppResult<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        UPDATE refresh_sessions
        SET revoked_at = NOW()
        WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()
        RETURNING user_id
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}

pub async fn refresh_session_revoke(pool: &DbPool, token_hash: &str) -> AppResult<()> {
    sqlx::query(
        "UPDATE refresh_sessions SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
    )
    .bind(token_hash)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn refresh_sessions_revoke_all(pool: &DbPool, user_id: Uuid) -> AppResult<u64> {
    let r = sqlx::query(
        "UPDATE refresh_sessions SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(r.rows_affected())
}

// ---- Categories ----

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    color: Option<String>,
    created_at: DateTime<Utc>,
    post_count: Option<i64>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Category {
            id: r.id,
            name: r.name,
            slug: r.slug,
            description: r.description,
            color: r.color,
            created_at: r.created_at,
            post_count: r.post_count,
        }
    }
}

pub async fn categories_list_with_counts(pool: &DbPool) -> AppResult<Vec<Category>> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        r#"
        SELECT c.id, c.name, c.slug, c.description, c.color, c.created_at,
               COUNT(p.id) FILTER (WHERE p.is_published)::bigint AS post_count
        FROM categories c
        LEFT JOIN posts p ON p.category_id = c.id
        GROUP BY c.id
        ORDER BY c.name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Category::from).collect())
}

pub async fn category_find_by_slug(pool: &DbPool, slug: &str) -> AppResult<Option<Category>> {
    let row = sqlx::query_as::<_, CategoryRow>(
        r#"
        SELECT c.id, c.name, c.slug, c.description, c.color, c.created_at,
               COUNT(p.id) FILTER (WHERE p.is_published)::bigint AS post_count
        FROM categories c
        LEFT JOIN posts p ON p.category_id = c.id
        WHERE c.slug = $1
        GROUP BY c.id
        "#,
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Category::from))
}

pub async fn category_create(
    pool: &DbPool,
    name: &str,
    slug: &str,
    description: Option<&str>,
    color: Option<&str>,
) -> AppResult<Category> {
    let row = sqlx::query_as::<_, CategoryRow>(
        r#"
        INSERT INTO categories (name, slug, description, color)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, slug, description, color, created_at, 0::bigint AS post_count
        "#,
    )
    .bind(name)
    .bind(slug)
    .bind(description)
    .bind(color)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "Category slug already exists"))?;
    Ok(row.into())
}

// ---- Posts ----

#[derive(Debug, FromRow)]
struct PostRow {
    id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    title: String,
    content: String,
    slug: String,
    author_id: Uuid,
    category_id: Option<Uuid>,
    published_at: Option<DateTime<Utc>>,
    is_published: bool,
    tags: Vec<String>,
    views: i64,
    image_url: Option<String>,
    alt_text: Option<String>,
    category_name: Option<String>,
    category_slug: Option<String>,
    category_color: Option<String>,
}

impl From<PostRow> for Post {
    fn from(r: PostRow) -> Self {
        let category = match (r.category_id, r.category_name, r.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(CategorySummary {
                id,
                name,
                slug,
                color: r.category_color,
            }),
            _ => None,
        };
        Post {
            id: r.id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            title: r.title,
            content: r.content,
            slug: r.slug,
            author_id: r.author_id,
            category_id: r.category_id,
            published_at: r.published_at,
            is_published: r.is_published,
            tags: r.tags,
            views: r.views,
            image_url: r.image_url,
            alt_text: r.alt_text,
            category,
        }
    }
}

const POST_COLUMNS: &str = r#"
    p.id, p.created_at, p.updated_at, p.title, p.content, p.slug, p.author_id,
    p.category_id, p.published_at, p.is_published, p.tags, p.views, p.image_url,
    p.alt_text, c.name AS category_name, c.slug AS category_slug, c.color AS category_color
"#;

const POST_FROM: &str = "FROM posts p LEFT JOIN categories c ON c.id = p.category_id";

fn page_offset(page: i64, limit: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(limit)
}

async fn fetch_posts(pool: &DbPool, sql: &str) -> AppResult<Vec<Post>> {
    let rows = sqlx::query_as::<_, PostRow>(sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(Post::from).collect())
}

/// Published posts, newest first.
pub async fn posts_list_published(pool: &DbPool, page: i64, limit: i64) -> AppResult<Vec<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} {POST_FROM} WHERE p.is_published = TRUE \
         ORDER BY p.created_at DESC LIMIT $1 OFFSET $2"
    );
    let rows = sqlx::query_as::<_, PostRow>(&sql)
        .bind(limit)
        .bind(page_offset(page, limit))
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Post::from).collect())
}

pub async fn posts_count_published(pool: &DbPool) -> AppResult<i64> {
    let (n,): (i64,) =
        sqlx::query_as("SELECT COUNT(*)::bigint FROM posts WHERE is_published = TRUE")
            .fetch_one(pool)
            .await?;
    Ok(n)
}

pub async fn post_find_published_by_slug(pool: &DbPool, slug: &str) -> AppResult<Option<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} {POST_FROM} WHERE p.slug = $1 AND p.is_published = TRUE"
    );
    let row = sqlx::query_as::<_, PostRow>(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Post::from))
}

pub async fn posts_list_by_category(
    pool: &DbPool,
    category_slug: &str,
    page: i64,
    limit: i64,
) -> AppResult<Vec<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} {POST_FROM} WHERE c.slug = $1 AND p.is_published = TRUE \
         ORDER BY p.published_at DESC NULLS LAST LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, PostRow>(&sql)
        .bind(category_slug)
        .bind(limit)
        .bind(page_offset(page, limit))
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Post::from).collect())
}

pub async fn posts_list_by_tag(
    pool: &DbPool,
    tag: &str,
    page: i64,
    limit: i64,
) -> AppResult<Vec<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} {POST_FROM} WHERE $1 = ANY(p.tags) AND p.is_published = TRUE \
         ORDER BY p.published_at DESC NULLS LAST LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, PostRow>(&sql)
        .bind(tag)
        .bind(limit)
        .bind(page_offset(page, limit))
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Post::from).collect())
}

pub async fn posts_popular(pool: &DbPool, limit: i64) -> AppResult<Vec<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} {POST_FROM} WHERE p.is_published = TRUE \
         ORDER BY p.views DESC, p.published_at DESC NULLS LAST LIMIT $1"
    );
    let rows = sqlx::query_as::<_, PostRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Post::from).collect())
}

/// Candidates for "related posts": published, sharing a tag or the category.
/// Ranking happens in `services::posts::rank_related`.
pub async fn posts_related_candidates(pool: &DbPool, post: &Post) -> AppResult<Vec<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} {POST_FROM} \
         WHERE p.is_published = TRUE AND p.id <> $1 \
           AND (p.tags && $2 OR ($3::uuid IS NOT NULL AND p.category_id = $3)) \
         ORDER BY p.views DESC LIMIT 30"
    );
    let rows = sqlx::query_as::<_, PostRow>(&sql)
        .bind(post.id)
        .bind(&post.tags)
        .bind(post.category_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Post::from).collect())
}

pub async fn tags_with_counts(pool: &DbPool) -> AppResult<Vec<TagCount>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT tag, COUNT(*)::bigint AS n
        FROM posts, UNNEST(tags) AS tag
        WHERE is_published = TRUE
        GROUP BY tag
        ORDER BY n DESC, tag ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(name, count)| TagCount { name, count })
        .collect())
}

/// Atomic `views + 1` on a published post.
pub async fn post_increment_views(pool: &DbPool, id: i64) -> AppResult<()> {
    let r = sqlx::query("UPDATE posts SET views = views + 1 WHERE id = $1 AND is_published = TRUE")
        .bind(id)
        .execute(pool)
        .await?;
    if r.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    Ok(())
}

// ---- Posts (admin) ----

/// All posts including drafts, newest first.
pub async fn posts_list_all(pool: &DbPool) -> AppResult<Vec<Post>> {
    let sql = format!("SELECT {POST_COLUMNS} {POST_FROM} ORDER BY p.created_at DESC");
    fetch_posts(pool, &sql).await
}

pub async fn post_get_by_id(pool: &DbPool, id: i64) -> AppResult<Option<Post>> {
    let sql = format!("SELECT {POST_COLUMNS} {POST_FROM} WHERE p.id = $1");
    let row = sqlx::query_as::<_, PostRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Post::from))
}

pub async fn post_create(pool: &DbPool, author_id: Uuid, post: &PostWrite) -> AppResult<Post> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO posts (title, content, slug, author_id, category_id, published_at,
                           is_published, tags, image_url, alt_text)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.slug)
    .bind(author_id)
    .bind(post.category_id)
    .bind(post.published_at)
    .bind(post.is_published)
    .bind(&post.tags)
    .bind(&post.image_url)
    .bind(&post.alt_text)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "Slug already in use"))?;

    post_get_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

pub async fn post_update(pool: &DbPool, id: i64, post: &PostWrite) -> AppResult<Post> {
    let r = sqlx::query(
        r#"
        UPDATE posts
        SET title = $2, content = $3, slug = $4, category_id = $5, published_at = $6,
            is_published = $7, tags = $8, image_url = $9, alt_text = $10, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.slug)
    .bind(post.category_id)
    .bind(post.published_at)
    .bind(post.is_published)
    .bind(&post.tags)
    .bind(&post.image_url)
    .bind(&post.alt_text)
    .execute(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "Slug already in use"))?;
    if r.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    post_get_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

pub async fn post_delete(pool: &DbPool, id: i64) -> AppResult<()> {
    let r = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if r.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    Ok(())
}

pub async fn post_stats(pool: &DbPool) -> AppResult<PostStats> {
    let (total_posts, published_posts, draft_posts, total_views): (i64, i64, i64, i64) =
        sqlx::query_as(
            r#"
            SELECT COUNT(*)::bigint,
                   COUNT(*) FILTER (WHERE is_published)::bigint,
                   COUNT(*) FILTER (WHERE NOT is_published)::bigint,
                   COALESCE(SUM(views), 0)::bigint
            FROM posts
            "#,
        )
        .fetch_one(pool)
        .await?;
    Ok(PostStats {
        total_posts,
        published_posts,
        draft_posts,
        total_views,
    })
}

// ---- Search ----

#[derive(Debug, FromRow)]
struct SearchRow {
    id: i64,
    title: String,
    content: String,
    slug: String,
    published_at: Option<DateTime<Utc>>,
    tags: Vec<String>,
    views: i64,
    image_url: Option<String>,
    alt_text: Option<String>,
    author_name: Option<String>,
    author_avatar_url: Option<String>,
    category_name: Option<String>,
    category_slug: Option<String>,
    category_color: Option<String>,
}

impl From<SearchRow> for SearchHit {
    fn from(r: SearchRow) -> Self {
        let category = match (r.category_name, r.category_slug) {
            (Some(name), Some(slug)) => Some(SearchCategory {
                name,
                slug,
                color: r.category_color,
            }),
            _ => None,
        };
        SearchHit {
            id: r.id,
            title: r.title,
            content: r.content,
            slug: r.slug,
            published_at: r.published_at,
            author: SearchAuthor {
                name: r.author_name.unwrap_or_else(|| "Unknown".to_string()),
                avatar_url: r.author_avatar_url,
            },
            category,
            tags: r.tags,
            views: r.views,
            image_url: r.image_url,
            alt_text: r.alt_text,
        }
    }
}

const SEARCH_WHERE: &str = r#"
    WHERE p.is_published = TRUE
      AND p.published_at <= NOW()
      AND (p.title ILIKE $1 OR p.content ILIKE $1 OR p.tags && $2)
      AND ($3::text IS NULL OR c.slug = $3)
      AND ($4::text[] IS NULL OR p.tags && $4)
"#;

/// Matching published posts and the total match count.
/// A query with no word characters matches nothing.
pub async fn search_posts(pool: &DbPool, opts: &SearchOptions) -> AppResult<(Vec<SearchHit>, i64)> {
    if normalize_query(&opts.query).is_empty() {
        return Ok((Vec::new(), 0));
    }
    let pattern = like_pattern(&opts.query);
    let terms: Vec<String> = opts.query.split_whitespace().map(str::to_string).collect();

    let count_sql = format!(
        "SELECT COUNT(*)::bigint FROM posts p LEFT JOIN categories c ON c.id = p.category_id {SEARCH_WHERE}"
    );
    let (total,): (i64,) = sqlx::query_as(&count_sql)
        .bind(&pattern)
        .bind(&terms)
        .bind(&opts.category)
        .bind(&opts.tags)
        .fetch_one(pool)
        .await?;

    let sql = format!(
        r#"
        SELECT p.id, p.title, p.content, p.slug, p.published_at, p.tags, p.views,
               p.image_url, p.alt_text,
               u.name AS author_name, u.avatar_url AS author_avatar_url,
               c.name AS category_name, c.slug AS category_slug, c.color AS category_color
        FROM posts p
        LEFT JOIN users u ON u.id = p.author_id
        LEFT JOIN categories c ON c.id = p.category_id
        {SEARCH_WHERE}
        ORDER BY p.published_at DESC, p.views DESC
        LIMIT $5 OFFSET $6
        "#
    );
    let rows = sqlx::query_as::<_, SearchRow>(&sql)
        .bind(&pattern)
        .bind(&terms)
        .bind(&opts.category)
        .bind(&opts.tags)
        .bind(opts.limit)
        .bind(opts.offset)
        .fetch_all(pool)
        .await?;
    Ok((rows.into_iter().map(SearchHit::from).collect(), total))
}

/// Titles and tags containing `prefix`, most viewed first.
pub async fn search_suggestions(pool: &DbPool, prefix: &str, limit: i64) -> AppResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT s FROM (
            SELECT title AS s, views FROM posts
            WHERE is_published = TRUE AND title ILIKE $1
            UNION ALL
            SELECT tag AS s, 0::bigint AS views FROM posts, UNNEST(tags) AS tag
            WHERE is_published = TRUE AND tag ILIKE $1
        ) candidates
        GROUP BY s
        ORDER BY MAX(views) DESC, s ASC
        LIMIT $2
        "#,
    )
    .bind(like_pattern(prefix))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_clamps_to_first_page() {
        assert_eq!(page_offset(0, 10), 0);
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 12), 24);
    }

    #[test]
    fn page_offset_saturates_on_huge_pages() {
        assert_eq!(page_offset(i64::MAX, 20), i64::MAX);
        assert_eq!(page_offset(i64::MIN, 20), 0);
    }
}
