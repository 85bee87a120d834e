//! Blog post models for the public and admin APIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::category::CategorySummary;

/// A blog post as returned by the JSON API and rendered by the pages.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_published: bool,
    pub tags: Vec<String>,
    pub views: i64,
    pub image_url: Option<String>,
    pub alt_text: Option<String>,
    pub category: Option<CategorySummary>,
}

/// Body of `POST /api/admin/posts`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    /// Derived from the title when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub image_url: Option<String>,
    #[serde(default)]
    #[validate(length(max = 300))]
    pub alt_text: Option<String>,
}

/// Body of `PUT /api/admin/posts/:id`.
///
/// Text fields apply only when non-empty. Nullable fields distinguish
/// "absent" (`None`) from an explicit `null` (`Some(None)`), which clears.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(max = 200))]
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_published: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub published_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub alt_text: Option<Option<String>>,
}

/// Column values written by insert/update.
#[derive(Debug, Clone, PartialEq)]
pub struct PostWrite {
    pub title: String,
    pub content: String,
    pub slug: String,
    pub category_id: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_published: bool,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub alt_text: Option<String>,
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStats {
    pub total_posts: i64,
    pub published_posts: i64,
    pub draft_posts: i64,
    pub total_views: i64,
}

/// Tag with the number of published posts carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
