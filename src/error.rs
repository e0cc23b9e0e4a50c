use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::rate_limit::QuotaStatus;

/// Errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("model not found")]
    NotFound,

    #[error("invalid model uid: {0}")]
    InvalidUid(String),

    #[error("catalog request failed: {0}")]
    Catalog(#[from] reqwest::Error),

    #[error("catalog returned {0}")]
    CatalogStatus(reqwest::StatusCode),

    #[error("rate limit exceeded, retry in {retry_after_minutes} minutes")]
    TooManyRequests {
        quota: QuotaStatus,
        retry_after_minutes: u64,
    },
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "ok": false }))).into_response()
            }
            err @ GatewayError::InvalidUid(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": err.to_string() })),
            )
                .into_response(),
            err @ (GatewayError::Catalog(_) | GatewayError::CatalogStatus(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": err.to_string() })),
            )
                .into_response(),
            GatewayError::TooManyRequests {
                quota,
                retry_after_minutes,
            } => {
                let mut headers = HeaderMap::new();
                crate::middleware::rate_limit::insert_quota_headers(&mut headers, &quota);
                if let Ok(value) = HeaderValue::from_str(&(retry_after_minutes * 60).to_string()) {
                    headers.insert(header::RETRY_AFTER, value);
                }

                let body = Json(json!({
                    "ok": false,
                    "error": "Too Many Requests",
                    "message": format!("超出請求限制。請等待 {} 分鐘後再試。", retry_after_minutes),
                    "retryAfter": retry_after_minutes,
                }));

                (StatusCode::TOO_MANY_REQUESTS, headers, body).into_response()
            }
        }
    }
}
