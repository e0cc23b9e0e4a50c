use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{rate_limit::RateLimitStats, AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RateLimitStatsResponse {
    pub ok: bool,
    pub stats: RateLimitStats,
}

/// Rate limiter statistics
///
/// Snapshot of every tracked client identity and the active policy. Reading
/// it does not count against any quota.
#[utoipa::path(
    get,
    path = "/api/rate-limit/stats",
    tag = "monitoring",
    responses(
        (status = 200, description = "Current rate limiter state", body = RateLimitStatsResponse)
    )
)]
pub async fn rate_limit_stats(State(state): State<AppState>) -> Json<RateLimitStatsResponse> {
    Json(RateLimitStatsResponse {
        ok: true,
        stats: state.rate_limiter.stats(),
    })
}
