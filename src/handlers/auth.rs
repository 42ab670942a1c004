//! Authentication handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::{DirectoryError, IdentityClaims},
    error::{ApiError, ApiResult},
    telemetry::{record_auth_attempt, AuthOutcome},
    AppState,
};

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";
pub const MISSING_FIELDS_MESSAGE: &str = "Username and password are required";

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[schema(example = "admin")]
    pub username: String,
    #[serde(default)]
    #[schema(example = "password")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 3, max = 64, message = "Username must be 3 to 64 characters"))]
    #[schema(example = "alice", min_length = 3, max_length = 64)]
    pub username: String,
    #[serde(default)]
    #[schema(example = "correct-horse-battery-staple")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "User registered successfully")]
    pub message: String,
    #[schema(example = "alice")]
    pub username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Logged out successfully")]
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyTokenRequest {
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "admin")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 1700003600)]
    pub expires_at: Option<u64>,
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        debug!(error = %rejection, "Rejected request body");
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    })
}

fn validate_username_chars(username: &str) -> Result<(), &'static str> {
    if username.chars().any(|c| c.is_whitespace() || c.is_control() || c == ':') {
        return Err("Username must not contain whitespace or ':'");
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing username or password", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 405, description = "Method not allowed", body = ApiError),
        (status = 429, description = "Too many attempts"),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let payload = parse_body(payload)?;

    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request(MISSING_FIELDS_MESSAGE));
    }

    let authenticated = state
        .users
        .authenticate(&payload.username, &payload.password)
        .map_err(|e| {
            error!(error = %e, "Password verification error");
            ApiError::internal("Password verification error")
        })?;

    if !authenticated {
        warn!(username = %payload.username, "Failed login attempt");
        record_auth_attempt("login", AuthOutcome::InvalidCredentials);
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS_MESSAGE));
    }

    let issued = state
        .tokens
        .issue(&IdentityClaims::new(payload.username.as_str()))
        .map_err(|e| {
            error!(error = %e, "Token generation failed");
            ApiError::internal("Token generation failed")
        })?;

    record_auth_attempt("login", AuthOutcome::Success);
    info!(username = %payload.username, expires_at = issued.expires_at, "User logged in");

    Ok(Json(LoginResponse {
        success: true,
        token: issued.token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = RegisterResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 405, description = "Method not allowed", body = ApiError),
        (status = 409, description = "User already exists", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let payload = parse_body(payload)?;

    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request(MISSING_FIELDS_MESSAGE));
    }

    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(format!("Validation error: {}", e)));
    }

    validate_username_chars(&payload.username).map_err(ApiError::bad_request)?;

    if let Err(e) = state.password_policy.validate(&payload.password) {
        return Err(ApiError::bad_request(e.to_string()));
    }

    match state.users.register(&payload.username, &payload.password) {
        Ok(()) => {}
        Err(DirectoryError::UserExists) => {
            warn!(username = %payload.username, "Registration for existing user");
            return Err(ApiError::conflict("User already exists"));
        }
        Err(e) => {
            error!(error = %e, "Failed to register user");
            return Err(ApiError::internal("Failed to process password"));
        }
    }

    info!(username = %payload.username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "User registered successfully".to_string(),
            username: payload.username,
        }),
    ))
}

/// Tokens are not tracked server-side, so logout only acknowledges the
/// client discarding its token.
#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "Authentication",
    responses(
        (status = 200, description = "Logged out", body = LogoutResponse),
        (status = 405, description = "Method not allowed", body = ApiError)
    )
)]
pub async fn logout() -> Json<LogoutResponse> {
    Json(LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    })
}

/// Verifies a token on behalf of another service.
#[utoipa::path(
    post,
    path = "/api/verify",
    tag = "Authentication",
    request_body = VerifyTokenRequest,
    responses(
        (status = 200, description = "Verification result", body = VerifyTokenResponse),
        (status = 400, description = "Invalid request", body = ApiError)
    )
)]
pub async fn verify_token(
    State(state): State<AppState>,
    payload: Result<Json<VerifyTokenRequest>, JsonRejection>,
) -> ApiResult<Json<VerifyTokenResponse>> {
    let payload = parse_body(payload)?;

    let response = match state.tokens.verify(&payload.token) {
        Ok(claims) => VerifyTokenResponse {
            valid: true,
            username: Some(claims.username),
            expires_at: Some(claims.exp),
        },
        Err(_) => VerifyTokenResponse {
            valid: false,
            username: None,
            expires_at: None,
        },
    };

    Ok(Json(response))
}
