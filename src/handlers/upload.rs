//! Image upload for post covers.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::handlers::http::AppState;
use crate::middleware::auth::AuthUser;
use crate::storage::{image_key, is_allowed_image_type, MAX_IMAGE_BYTES};

/// Request body cap for the upload route: the file limit plus multipart overhead.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub image_url: String,
    pub file_name: String,
    pub file_size: usize,
    pub content_type: String,
}

fn too_large() -> AppError {
    AppError::PayloadTooLarge("File size cannot exceed 5MB".to_string())
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large()
    } else {
        AppError::BadRequest(format!("Failed to read upload: {}", e))
    }
}

/// POST /api/upload/image (multipart field `file`)
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut upload: Option<(Option<String>, String, Vec<u8>)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or_default().to_string();
        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if data.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(too_large());
            }
            data.extend_from_slice(&chunk);
        }
        upload = Some((file_name, content_type, data));
        break;
    }

    let (file_name, content_type, data) =
        upload.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    if data.is_empty() {
        return Err(AppError::BadRequest("No file provided".to_string()));
    }
    if !is_allowed_image_type(&content_type) {
        return Err(AppError::BadRequest(
            "Unsupported file type. Only JPG, PNG, GIF and WebP are supported.".to_string(),
        ));
    }

    let key = image_key(file_name.as_deref(), &content_type);
    let file_size = data.len();
    let image_url = state.store().put(&key, data, &content_type).await?;
    info!(user_id = %user.id, key = %key, size = file_size, backend = state.store().name(), "image uploaded");

    Ok(Json(UploadResponse {
        success: true,
        image_url,
        file_name: key,
        file_size,
        content_type,
    }))
}
