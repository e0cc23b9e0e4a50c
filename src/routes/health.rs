use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub server_config: ServerConfigInfo,
    pub rate_limiting: RateLimitingInfo,
    pub stored_models: usize,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ServerConfigInfo {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RateLimitingInfo {
    pub enabled: bool,
    pub max_requests_per_window: u32,
    pub window_seconds: u64,
    pub tracked_identities: usize,
}

/// Basic health check endpoint
///
/// Returns a simple health status indicating the service is running.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy")
    )
)]
pub async fn health(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "model-gallery".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Detailed health check endpoint
///
/// Returns the active server and rate limiting settings along with the
/// current size of the in-memory state.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Detailed health information", body = DetailedHealthResponse),
        (status = 503, description = "Service is unhealthy")
    )
)]
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    info!("Detailed health check requested");

    let config = &state.config;

    Json(DetailedHealthResponse {
        status: "healthy".to_string(),
        service: "model-gallery".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        server_config: ServerConfigInfo {
            host: config.server.host.clone(),
            port: config.server.port,
            timeout_seconds: config.server.timeout_seconds,
        },
        rate_limiting: RateLimitingInfo {
            enabled: config.rate_limiting.enabled,
            max_requests_per_window: config.rate_limiting.max_requests_per_window,
            window_seconds: config.rate_limiting.window_seconds,
            tracked_identities: state.rate_limiter.tracked_identities(),
        },
        stored_models: state.store.count().await,
    })
}
