//! Keygate - stateless bearer-token authentication service.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod telemetry;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use auth::{PasswordHasher, PasswordPolicy, TokenService, UserDirectory};
use error::StartupError;
use middleware::{
    auth_middleware, credential_rate_limit_middleware, metrics_middleware,
    request_id_middleware, RateLimitState,
};
use telemetry::MetricsState;

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub users: UserDirectory,
    pub password_policy: PasswordPolicy,
    pub rate_limit: RateLimitState,
    pub metrics: MetricsState,
    pub totp_issuer: Arc<str>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, StartupError> {
        let hasher = PasswordHasher::with_cost(config.security.password_hash_cost)
            .map_err(|e| StartupError::Hasher(e.to_string()))?;

        let users = UserDirectory::new(hasher)?;
        let seeded = users.seed(&config.users.seed)?;
        info!(users = seeded, "Seeded user directory");

        let tokens = TokenService::new(
            config.token.secret.expose_secret().as_bytes(),
            Duration::from_secs(config.token.ttl_secs),
            config.token.issuer.clone(),
        )?;

        let rate_limit = if config.security.rate_limiting_enabled {
            RateLimitState::per_minute(config.security.rate_limit_requests_per_minute)
        } else {
            RateLimitState::disabled()
        };

        Ok(Self {
            tokens: Arc::new(tokens),
            users,
            password_policy: PasswordPolicy::new(
                config.security.min_password_length,
                config.security.require_password_complexity,
            ),
            rate_limit,
            metrics: MetricsState::new(config.telemetry.metrics_enabled),
            totp_issuer: Arc::from(config.security.totp_issuer.as_str()),
        })
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let metrics_state = state.metrics.clone();
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/api/health", get(handlers::health::health_check))
        .route(
            "/api/logout",
            post(handlers::auth::logout).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/verify",
            post(handlers::auth::verify_token).fallback(handlers::method_not_allowed),
        )
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(metrics_state),
        )
        .with_state(state.clone());

    // Only the POST handlers are limited; wrong-method requests never reach
    // the limiter and spend no budget.
    let credential_limit = axum_middleware::from_fn_with_state(
        state.rate_limit.clone(),
        credential_rate_limit_middleware,
    );
    let credential_routes = Router::new()
        .route(
            "/api/login",
            post(handlers::auth::login)
                .route_layer(credential_limit.clone())
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/register",
            post(handlers::auth::register)
                .route_layer(credential_limit)
                .fallback(handlers::method_not_allowed),
        )
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/dashboard", get(handlers::dashboard::dashboard))
        .route("/api/2fa/init", post(handlers::mfa::init_two_factor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(openapi::swagger_router())
        .merge(public_routes)
        .merge(credential_routes)
        .merge(protected_routes)
        .fallback(handlers::not_found)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::Method;

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    let cors = if config.cors.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<_> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    cors.allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(config.cors.max_age_secs))
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use telemetry::shutdown_telemetry;

pub use config::Config;
