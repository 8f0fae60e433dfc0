use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{Response as HttpResponse, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorError, GovernorLayer};

/// Governor layer keyed by the peer IP address
pub type IpGovernorLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    Body,
>;

fn ip_governor(per_ms: u64, burst: u32) -> IpGovernorLayer {
    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(burst)
            .finish()
            .expect("rate limit period and burst must be non-zero"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

/// Global limiter applied to the whole router before authentication
/// - 1000 requests per minute per IP (one token every 60ms)
pub fn create_global_governor() -> IpGovernorLayer {
    ip_governor(60, 1000)
}

/// Limiter for unauthenticated routes (auth, catalogue, estimates)
/// - 100 requests per minute per IP, matching the passenger limit
pub fn create_public_governor() -> IpGovernorLayer {
    ip_governor(600, 100)
}

/// Render governor rejections as JSON errors
pub fn rate_limit_error_handler(error: GovernorError) -> HttpResponse<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Too many requests",
                "retry_after_secs": wait_time,
            })),
        )
            .into_response(),
        GovernorError::UnableToExtractKey => {
            tracing::error!("Rate limiter could not extract a key from the request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
        GovernorError::Other { code, msg, .. } => (
            code,
            Json(json!({ "error": msg.unwrap_or_else(|| "Request rejected".to_string()) })),
        )
            .into_response(),
    }
}

/// Middleware to log rate limiting and request outcomes
pub async fn log_request(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    tracing::debug!(client_ip = %addr.ip(), method = %method, uri = %uri, "Incoming request");

    let response = next.run(request).await;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(
            client_ip = %addr.ip(),
            method = %method,
            uri = %uri,
            "Rate limited"
        );
    } else if status.is_client_error() || status.is_server_error() {
        tracing::warn!(
            client_ip = %addr.ip(),
            method = %method,
            uri = %uri,
            status = %status,
            "Request failed"
        );
    } else {
        tracing::debug!(
            client_ip = %addr.ip(),
            method = %method,
            uri = %uri,
            status = %status,
            "Request completed"
        );
    }

    response
}
