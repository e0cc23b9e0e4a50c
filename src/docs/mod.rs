use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    rate_limit::{RateLimitStats, UsageEntry},
    routes::{health, models, rate_limit},
    store::Model,
    AppState,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::health_detailed,
        models::import_model,
        models::list_models,
        models::get_model,
        models::latest_model,
        models::delete_model,
        rate_limit::rate_limit_stats,
    ),
    components(
        schemas(
            health::HealthResponse,
            health::DetailedHealthResponse,
            health::ServerConfigInfo,
            health::RateLimitingInfo,
            Model,
            models::ModelResponse,
            models::ModelListResponse,
            models::LatestModelResponse,
            models::DeleteModelResponse,
            rate_limit::RateLimitStatsResponse,
            RateLimitStats,
            UsageEntry,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "models", description = "Catalog import and stored model endpoints"),
        (name = "monitoring", description = "Monitoring and status endpoints"),
    ),
    info(
        title = "Model Gallery API",
        description = "3D model gallery with per-client rate limiting",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT",
        ),
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server"),
    ),
)]
pub struct ApiDoc;

pub fn create_swagger_router() -> Router<AppState> {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
