use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::{
    error::GatewayError,
    metrics,
    rate_limit::{Decision, QuotaStatus},
    AppState,
};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Gate every API request through the per-client limiter.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let settings = &state.config.rate_limiting;
    if !settings.enabled {
        return next.run(request).await;
    }

    let identity = client_identity(&request, &settings.fallback_identity);
    let referer = referer(request.headers());

    let decision = state.rate_limiter.check(&identity, referer);
    metrics::record_decision(&decision);
    if !matches!(decision, Decision::Bypassed) {
        metrics::record_tracked_identities(state.rate_limiter.tracked_identities());
    }

    match decision {
        Decision::Bypassed => {
            debug!(identity = %identity, referer, "Request from allowed origin");
            next.run(request).await
        }
        Decision::Admitted(quota) => {
            debug!(
                identity = %identity,
                referer,
                remaining = quota.remaining,
                "Request admitted"
            );
            let mut response = next.run(request).await;
            insert_quota_headers(response.headers_mut(), &quota);
            response
        }
        Decision::Rejected {
            quota,
            retry_after_minutes,
        } => {
            warn!(
                identity = %identity,
                referer,
                limit = quota.limit,
                retry_after_minutes,
                "Rate limit exceeded"
            );
            GatewayError::TooManyRequests {
                quota,
                retry_after_minutes,
            }
            .into_response()
        }
    }
}

/// Peer IP of the connection, or `fallback` when the server was not started
/// with connect info. All fallback requests share a single counter.
pub fn client_identity(request: &Request, fallback: &str) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

fn referer(headers: &HeaderMap) -> &str {
    headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Add the `X-RateLimit-*` headers. The reset value is Unix epoch millis.
pub fn insert_quota_headers(headers: &mut HeaderMap, quota: &QuotaStatus) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(quota.reset_at.timestamp_millis()),
    );
}
