//! Object storage for uploaded post images.

mod local;
mod s3;

pub use local::{LocalStore, LOCAL_URL_PREFIX};
pub use s3::S3Store;

use std::sync::Arc;
use uuid::Uuid;

use crate::config::UploadBackend;
use crate::error::AppResult;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub const ALLOWED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Key prefix for post images.
pub const IMAGE_PREFIX: &str = "blog-images";

/// Writes objects and returns their public URL.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> AppResult<String>;

    /// Backend name for logs and health output.
    fn name(&self) -> &'static str;
}

pub fn build_store(backend: &UploadBackend) -> Arc<dyn ObjectStore> {
    match backend {
        UploadBackend::Local { dir } => Arc::new(LocalStore::new(dir.clone())),
        UploadBackend::S3(cfg) => Arc::new(S3Store::new(cfg.clone())),
    }
}

pub fn is_allowed_image_type(content_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&content_type)
}

/// `blog-images/<uuid>.<ext>`. The extension always agrees with the
/// content type; a file-name extension is kept only when it is one of the
/// type's own spellings (`photo.jpeg` stays `.jpeg`, `evil.html` becomes `.png`).
pub fn image_key(file_name: Option<&str>, content_type: &str) -> String {
    let allowed = extensions_for(content_type);
    let ext = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| allowed.iter().copied().find(|a| *a == ext))
        .unwrap_or(allowed[0]);
    format!("{}/{}.{}", IMAGE_PREFIX, Uuid::new_v4(), ext)
}

fn extensions_for(content_type: &str) -> &'static [&'static str] {
    match content_type {
        "image/png" => &["png"],
        "image/gif" => &["gif"],
        "image/webp" => &["webp"],
        "image/jpeg" | "image/jpg" => &["jpg", "jpeg"],
        _ => &["bin"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_types() {
        assert!(is_allowed_image_type("image/webp"));
        assert!(is_allowed_image_type("image/jpg"));
        assert!(!is_allowed_image_type("image/svg+xml"));
        assert!(!is_allowed_image_type("application/pdf"));
    }

    #[test]
    fn key_uses_file_extension() {
        let key = image_key(Some("Photo.PNG"), "image/png");
        assert!(key.starts_with("blog-images/"));
        assert!(key.ends_with(".png"));
        assert_eq!(key.len(), "blog-images/".len() + 36 + ".png".len());
    }

    #[test]
    fn key_falls_back_to_content_type() {
        assert!(image_key(None, "image/webp").ends_with(".webp"));
        assert!(image_key(Some("noext"), "image/gif").ends_with(".gif"));
        assert!(image_key(Some("weird.p/ng"), "image/jpeg").ends_with(".jpg"));
    }

    #[test]
    fn key_extension_never_disagrees_with_type() {
        assert!(image_key(Some("evil.html"), "image/png").ends_with(".png"));
        assert!(image_key(Some("evil.svg"), "image/webp").ends_with(".webp"));
        assert!(image_key(Some("photo.JPEG"), "image/jpeg").ends_with(".jpeg"));
        assert!(image_key(Some("photo.png"), "image/jpg").ends_with(".jpg"));
        assert!(image_key(Some("x.html"), "text/html").ends_with(".bin"));
    }

    #[test]
    fn keys_are_unique() {
        assert_ne!(image_key(None, "image/png"), image_key(None, "image/png"));
    }
}
