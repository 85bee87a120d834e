//! Application error types for robust error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Validation failure carrying per-field details (search parameters).
    #[error("Validation error: {message}")]
    InvalidParams {
        message: String,
        details: serde_json::Value,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("JWT error: {0}")]
    Jwt(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidParams { .. } | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Serialization(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Redis(_) | AppError::Search(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::Db(_) | AppError::Template(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error code returned alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::InvalidParams { .. } => "VALIDATION_ERROR",
            AppError::BadRequest(_) | AppError::Serialization(_) => "BAD_REQUEST",
            AppError::Auth(_) | AppError::Jwt(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::RateLimited => "RATE_LIMIT_EXCEEDED",
            AppError::Redis(_) => "SERVICE_UNAVAILABLE",
            AppError::Search(_) => "SEARCH_SERVICE_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Config(_) | AppError::Db(_) | AppError::Template(_) | AppError::Internal(_) => {
                "INTERNAL_SERVER_ERROR"
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match &self {
            AppError::Validation(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::Auth(msg)
            | AppError::Jwt(msg) => msg.clone(),
            AppError::InvalidParams { message, .. } => message.clone(),
            AppError::Serialization(e) => format!("Invalid payload: {}", e),
            AppError::RateLimited => {
                "Too many requests. Please try again shortly.".to_string()
            }
            AppError::Search(_) => {
                "The search service is temporarily unavailable. Please try again shortly.".to_string()
            }
            AppError::Redis(_) => "Cache backend unavailable".to_string(),
            AppError::Storage(_) => "Image upload failed".to_string(),
            AppError::Config(_) | AppError::Db(_) | AppError::Template(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }

        let body = match self {
            AppError::InvalidParams { details, .. } => {
                json!({ "error": message, "code": code, "details": details })
            }
            _ => json!({ "error": message, "code": code }),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Map unique-constraint violations to `Conflict`, leaving other DB errors intact.
pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return AppError::Conflict(message.to_string());
        }
    }
    AppError::Db(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Search("down".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::Auth("no".into()).code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn invalid_params_carry_details() {
        let err = AppError::InvalidParams {
            message: "Invalid request parameters".into(),
            details: json!([{ "field": "q" }]),
        };
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["details"][0]["field"], "q");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let res = AppError::Internal(anyhow::anyhow!("secret db path")).into_response();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }
}
