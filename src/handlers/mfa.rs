//! Two-factor enrollment.
//!
//! Enrollment only provisions a secret: the base32 seed and an `otpauth://`
//! URL for authenticator apps. The secret is held as the user's pending
//! secret until a later confirmation step activates it.

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::{
    auth::{DirectoryError, VerifiedClaims},
    error::{ApiError, ApiResult},
    AppState,
};

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP_SECS: u64 = 30;

#[derive(Debug, Serialize, ToSchema)]
pub struct TwoFactorInitResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP")]
    pub secret: String,
    #[schema(example = "otpauth://totp/keygate:admin?secret=JBSWY3DPEHPK3PXP&issuer=keygate")]
    pub otpauth_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("secret generation failed: {0}")]
    Secret(String),
    #[error("invalid TOTP parameters: {0}")]
    Totp(String),
}

/// Builds a fresh SHA1/6-digit/30s TOTP for `account`.
pub fn new_totp(issuer: &str, account: &str) -> Result<TOTP, EnrollmentError> {
    let secret_bytes = Secret::generate_secret()
        .to_bytes()
        .map_err(|e| EnrollmentError::Secret(e.to_string()))?;

    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        TOTP_STEP_SECS,
        secret_bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| EnrollmentError::Totp(e.to_string()))
}

#[utoipa::path(
    post,
    path = "/api/2fa/init",
    tag = "Two-Factor",
    responses(
        (status = 200, description = "Enrollment secret provisioned", body = TwoFactorInitResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ApiError),
        (status = 404, description = "User no longer exists", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn init_two_factor(
    State(state): State<AppState>,
    Extension(claims): Extension<VerifiedClaims>,
) -> ApiResult<Json<TwoFactorInitResponse>> {
    let totp = new_totp(&state.totp_issuer, &claims.username).map_err(|e| {
        error!(error = %e, username = %claims.username, "Failed to create TOTP secret");
        ApiError::internal("Failed to initialize two-factor authentication")
    })?;

    let secret = totp.get_secret_base32();
    let otpauth_url = totp.get_url();

    match state.users.set_pending_totp(&claims.username, secret.clone()) {
        Ok(()) => {}
        // A valid token can outlive its account: the directory is in-memory.
        Err(DirectoryError::UserNotFound) => {
            warn!(username = %claims.username, "Two-factor init for unknown user");
            return Err(ApiError::not_found("User not found"));
        }
        Err(e) => {
            error!(error = %e, "Failed to store pending TOTP secret");
            return Err(ApiError::internal(
                "Failed to initialize two-factor authentication",
            ));
        }
    }

    info!(username = %claims.username, "Two-factor enrollment started");

    Ok(Json(TwoFactorInitResponse {
        success: true,
        secret,
        otpauth_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn claims(username: &str) -> VerifiedClaims {
        VerifiedClaims {
            username: username.to_string(),
            iat: 0,
            exp: u64::MAX,
        }
    }

    #[test]
    fn test_new_totp_generates_codes() {
        let totp = new_totp("keygate", "admin").unwrap();
        let code = totp.generate_current().unwrap();
        assert_eq!(code.len(), 6);
        assert!(totp.check_current(&code).unwrap());
    }

    #[test]
    fn test_new_totp_rejects_colon_in_account() {
        assert!(matches!(
            new_totp("keygate", "ad:min"),
            Err(EnrollmentError::Totp(_))
        ));
    }

    #[tokio::test]
    async fn test_init_stores_pending_secret() {
        let state = AppState::new(&Config::default_for_testing()).unwrap();

        let Json(body) = init_two_factor(State(state.clone()), Extension(claims("admin")))
            .await
            .unwrap();

        assert!(body.success);
        assert!(body.otpauth_url.starts_with("otpauth://totp/"));
        assert!(body.otpauth_url.contains("issuer=keygate-test"));

        let record = state.users.get("admin").unwrap();
        assert_eq!(record.pending_totp_secret.as_deref(), Some(body.secret.as_str()));
    }

    #[tokio::test]
    async fn test_init_unknown_user() {
        let state = AppState::new(&Config::default_for_testing()).unwrap();

        let (status, _) = init_two_factor(State(state), Extension(claims("ghost")))
            .await
            .unwrap_err();
        assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_each_init_rotates_secret() {
        let state = AppState::new(&Config::default_for_testing()).unwrap();

        let Json(first) = init_two_factor(State(state.clone()), Extension(claims("admin")))
            .await
            .unwrap();
        let Json(second) = init_two_factor(State(state), Extension(claims("admin")))
            .await
            .unwrap();
        assert_ne!(first.secret, second.secret);
    }
}
