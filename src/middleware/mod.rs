//! Request middleware.

pub mod auth;
pub mod metrics;
pub mod rate_limit;
pub mod request_id;

pub use auth::auth_middleware;
pub use self::metrics::metrics_middleware;
pub use rate_limit::{credential_rate_limit_middleware, RateLimitState};
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
