use std::path::PathBuf;
use tracing::info;

use super::ObjectStore;
use crate::error::{AppError, AppResult};

/// URL prefix under which the upload directory is served.
pub const LOCAL_URL_PREFIX: &str = "/uploads";

/// Files under a local directory, served by the app itself.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> AppResult<String> {
        if key.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(AppError::BadRequest("Invalid object key".to_string()));
        }
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
        }
        let size = body.len();
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        info!(key, size, "stored upload locally");
        Ok(format!("{}/{}", LOCAL_URL_PREFIX, key))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
