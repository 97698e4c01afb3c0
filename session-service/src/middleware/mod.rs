pub mod auth;
pub mod metrics;

pub use auth::{require_session, AuthUser, BearerToken};
pub use metrics::metrics_middleware;
