//! Per-IP rate limiting for the credential endpoints.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use serde::Serialize;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};
use tracing::warn;

use crate::telemetry::{record_auth_attempt, AuthOutcome};

pub type KeyedRateLimiter =
    RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

#[derive(Clone)]
pub struct RateLimitState {
    limiter: Option<Arc<KeyedRateLimiter>>,
    requests_per_minute: u32,
}

impl RateLimitState {
    /// Allows `requests_per_minute` per client IP, with the full minute's
    /// budget available as a burst.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let Some(burst) = NonZeroU32::new(requests_per_minute) else {
            return Self::disabled();
        };

        let period = Duration::from_secs(60) / burst.get();
        let limiter = Quota::with_period(period)
            .map(|quota| Arc::new(RateLimiter::dashmap(quota.allow_burst(burst))));

        Self {
            limiter,
            requests_per_minute,
        }
    }

    pub fn disabled() -> Self {
        Self {
            limiter: None,
            requests_per_minute: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Returns the wait in whole seconds (at least 1) when `ip` is over budget.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        limiter.check_key(&ip).map_err(|not_until| {
            not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1)
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RateLimitExceeded {
    pub success: bool,
    pub message: String,
    pub retry_after_secs: u64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let retry_after = HeaderValue::from(self.retry_after_secs);
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(self)).into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, retry_after);
        response
    }
}

fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn credential_rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    let ip = client_ip(&request);

    if let Err(retry_after_secs) = state.check(ip) {
        warn!(ip = %ip, retry_after_secs, "Credential endpoint rate limit exceeded");
        record_auth_attempt("rate_limit", AuthOutcome::RateLimited);
        return Err(RateLimitExceeded {
            success: false,
            message: "Too many authentication attempts".to_string(),
            retry_after_secs,
        });
    }

    let mut response = next.run(request).await;
    if state.is_enabled() {
        response.headers_mut().insert(
            "x-ratelimit-limit",
            HeaderValue::from(state.requests_per_minute),
        );
    }
    Ok(response)
}
