use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Capabilities the embedded viewer needs; everything else stays off.
const VIEWER_PERMISSIONS: &str = "accelerometer=(self), gyroscope=(self), magnetometer=(self), \
xr-spatial-tracking=(self), fullscreen=(self), autoplay=(self)";

pub async fn permissions_policy_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        PERMISSIONS_POLICY,
        HeaderValue::from_static(VIEWER_PERMISSIONS),
    );
    response
}
