//! Shared error handling utilities.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{DirectoryError, TokenError};
use crate::config::ConfigError;

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    #[schema(example = false)]
    pub success: bool,
    #[schema(example = "Invalid credentials")]
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (status, Json(Self::new(message)))
    }

    pub fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::NOT_FOUND, message)
    }

    pub fn method_not_allowed() -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    pub fn conflict(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Failures while assembling the application at startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("token service: {0}")]
    Token(#[from] TokenError),
    #[error("user directory: {0}")]
    Directory(#[from] DirectoryError),
    #[error("password hasher: {0}")]
    Hasher(String),
}
