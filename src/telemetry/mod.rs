//! Observability: tracing, metrics, and OpenTelemetry export.

pub mod metrics;
pub mod tracing;

pub use self::metrics::{record_auth_attempt, AuthOutcome, MetricsState};
pub use self::tracing::{init_telemetry, shutdown_telemetry};
