use axum::http::Request;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::KeyExtractor,
    GovernorError, GovernorLayer,
};
use uuid::Uuid;

use crate::middleware::rate_limit::rate_limit_error_handler;
use crate::utils::jwt::Claims;

/// Key extractor that limits per authenticated user (claims set by auth_middleware)
#[derive(Debug, Clone, Copy)]
pub struct UserIdExtractor;

impl KeyExtractor for UserIdExtractor {
    type Key = Uuid;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        req.extensions()
            .get::<Claims>()
            .map(|claims| claims.sub)
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

pub type RoleGovernorLayer = GovernorLayer<
    UserIdExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Roles that get a per-user limiter. Admin routes rely on the global IP limiter only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitedRole {
    Passenger,
    Driver,
}

impl RateLimitedRole {
    /// (milliseconds per replenished token, burst size)
    pub fn quota(self) -> (u64, u32) {
        match self {
            // Drivers poll pending rides and push locations
            RateLimitedRole::Driver => (120, 500),
            RateLimitedRole::Passenger => (600, 100),
        }
    }
}

pub fn create_role_governor(role: RateLimitedRole) -> RoleGovernorLayer {
    let (per_ms, burst) = role.quota();

    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(burst)
            .key_extractor(UserIdExtractor)
            .finish()
            .expect("rate limit period and burst must be non-zero"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}
