//! Bearer authentication middleware.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::auth::{parse_bearer, BearerCredential};
use crate::error::ApiError;
use crate::telemetry::{record_auth_attempt, AuthOutcome};
use crate::AppState;

pub const NO_TOKEN_MESSAGE: &str = "No token provided";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";

/// Verifies the bearer token and stores the recovered claims in request
/// extensions for downstream handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = match parse_bearer(req.headers().get(header::AUTHORIZATION)) {
        BearerCredential::Present(token) => token,
        BearerCredential::Absent => {
            record_auth_attempt("bearer", AuthOutcome::MissingToken);
            return Err(ApiError::unauthorized(NO_TOKEN_MESSAGE).into_response());
        }
        BearerCredential::Malformed => {
            debug!("Malformed authorization header");
            record_auth_attempt("bearer", AuthOutcome::InvalidToken);
            return Err(ApiError::unauthorized(INVALID_TOKEN_MESSAGE).into_response());
        }
    };

    let claims = state.tokens.verify(token).map_err(|_| {
        record_auth_attempt("bearer", AuthOutcome::InvalidToken);
        ApiError::unauthorized(INVALID_TOKEN_MESSAGE).into_response()
    })?;

    record_auth_attempt("bearer", AuthOutcome::Success);
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
