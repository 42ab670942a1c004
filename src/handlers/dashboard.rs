use axum::{Extension, Json};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::auth::VerifiedClaims;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Welcome to your dashboard, admin!")]
    pub message: String,
    #[schema(example = "admin")]
    pub username: String,
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Dashboard greeting", body = DashboardResponse),
        (status = 401, description = "Missing, invalid or expired token", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn dashboard(Extension(claims): Extension<VerifiedClaims>) -> Json<DashboardResponse> {
    debug!(username = %claims.username, "Dashboard accessed");

    Json(DashboardResponse {
        success: true,
        message: format!("Welcome to your dashboard, {}!", claims.username),
        username: claims.username,
    })
}
