use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub mod catalog;
pub mod config;
pub mod docs;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod store;

use crate::{
    catalog::CatalogClient, config::AppConfig, error::GatewayError, rate_limit::RateLimiter,
    store::ModelStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub store: Arc<ModelStore>,
    pub catalog: CatalogClient,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, GatewayError> {
        let catalog = CatalogClient::new(&config.catalog)?;
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limiting));

        Ok(Self {
            config: Arc::new(config),
            rate_limiter,
            store: Arc::new(ModelStore::new()),
            catalog,
            metrics,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Model API, every route counts against the client's quota
    let gated = Router::new()
        .route("/api/import/:uid", post(routes::models::import_model))
        .route("/api/models", get(routes::models::list_models))
        .route(
            "/api/models/:uid",
            get(routes::models::get_model).delete(routes::models::delete_model),
        )
        .route("/api/model", get(routes::models::latest_model))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ));

    Router::new()
        // Health check endpoints
        .route("/health", get(routes::health::health))
        .route("/api/v1/health", get(routes::health::health_detailed))
        // Rate limiter introspection
        .route(
            "/api/rate-limit/stats",
            get(routes::rate_limit::rate_limit_stats),
        )
        // Metrics endpoint
        .route(&config.metrics.path, get(metrics_handler))
        .merge(gated)
        .merge(docs::create_swagger_router())
        .fallback_service(ServeDir::new(&config.static_files.dir))
        // Add middleware layers
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.timeout_seconds,
                )))
                .layer(from_fn(
                    middleware::permissions_policy::permissions_policy_middleware,
                )),
        )
        .with_state(state)
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
