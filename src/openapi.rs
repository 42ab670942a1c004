//! OpenAPI documentation served through Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::handlers::{
    auth::{
        LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse,
        VerifyTokenRequest, VerifyTokenResponse,
    },
    dashboard::DashboardResponse,
    health::HealthResponse,
    mfa::TwoFactorInitResponse,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Keygate API",
        version = "1.0.0",
        description = "Stateless bearer-token authentication.\n\n\
        ## Authentication\n\
        1. `POST /api/login` with a username and password to receive a token\n\
        2. Send it on protected routes as `Authorization: Bearer <token>`\n\n\
        Tokens are signed with a server secret and expire after a fixed lifetime. \
        Nothing is stored server-side, so logout is a client-side action."
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Login, registration and token verification"),
        (name = "Dashboard", description = "Token-protected resources"),
        (name = "Two-Factor", description = "TOTP enrollment")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,

        crate::handlers::auth::login,
        crate::handlers::auth::register,
        crate::handlers::auth::logout,
        crate::handlers::auth::verify_token,

        crate::handlers::dashboard::dashboard,
        crate::handlers::mfa::init_two_factor,
    ),
    components(
        schemas(
            ApiError,
            HealthResponse,
            LoginRequest,
            LoginResponse,
            RegisterRequest,
            RegisterResponse,
            LogoutResponse,
            VerifyTokenRequest,
            VerifyTokenResponse,
            DashboardResponse,
            TwoFactorInitResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Token obtained from /api/login.\n\
                            Include in requests as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Keygate API");
    }

    #[test]
    fn test_openapi_has_security_scheme() {
        let components = ApiDoc::openapi().components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_documents_routes() {
        let spec = ApiDoc::openapi();
        for path in [
            "/api/login",
            "/api/register",
            "/api/logout",
            "/api/verify",
            "/api/dashboard",
            "/api/2fa/init",
            "/api/health",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
