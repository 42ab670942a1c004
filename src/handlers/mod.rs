//! HTTP request handlers.

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod mfa;

use crate::error::{ApiError, ApiResult};

/// Answers a known path requested with an unsupported method.
pub async fn method_not_allowed() -> ApiResult<()> {
    Err(ApiError::method_not_allowed())
}

pub async fn not_found() -> ApiResult<()> {
    Err(ApiError::not_found("Not found"))
}
