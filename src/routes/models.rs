use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::{error::GatewayError, metrics, store::Model, AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModelResponse {
    pub ok: bool,
    pub model: Model,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModelListResponse {
    pub ok: bool,
    pub models: Vec<Model>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LatestModelResponse {
    pub ok: bool,
    pub uid: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteModelResponse {
    pub ok: bool,
    pub deleted: u64,
}

/// Import a model from the catalog
///
/// Fetches the model's catalog document and stores it, replacing any
/// earlier import of the same uid.
#[utoipa::path(
    post,
    path = "/api/import/{uid}",
    tag = "models",
    params(("uid" = String, Path, description = "Catalog model uid")),
    responses(
        (status = 200, description = "Model imported", body = ModelResponse),
        (status = 400, description = "Malformed uid"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Catalog fetch failed")
    )
)]
pub async fn import_model(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<ModelResponse>, GatewayError> {
    let doc = match state.catalog.fetch_model(&uid).await {
        Ok(doc) => doc,
        Err(e) => {
            error!(uid = %uid, error = %e, "Model import failed");
            metrics::record_catalog_import(false);
            return Err(e);
        }
    };
    metrics::record_catalog_import(true);

    let model = state
        .store
        .upsert(Model::from_catalog(&uid, doc, chrono::Utc::now()))
        .await;
    info!(uid = %model.uid, name = %model.name, "Model imported");

    Ok(Json(ModelResponse { ok: true, model }))
}

/// List stored models, most recently updated first
#[utoipa::path(
    get,
    path = "/api/models",
    tag = "models",
    responses(
        (status = 200, description = "Stored models", body = ModelListResponse),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn list_models(State(state): State<AppState>) -> Json<ModelListResponse> {
    Json(ModelListResponse {
        ok: true,
        models: state.store.list().await,
    })
}

/// Fetch one stored model
#[utoipa::path(
    get,
    path = "/api/models/{uid}",
    tag = "models",
    params(("uid" = String, Path, description = "Catalog model uid")),
    responses(
        (status = 200, description = "Stored model", body = ModelResponse),
        (status = 404, description = "No such model"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn get_model(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<ModelResponse>, GatewayError> {
    let model = state.store.get(&uid).await.ok_or(GatewayError::NotFound)?;
    Ok(Json(ModelResponse { ok: true, model }))
}

/// Uid of the most recently updated model
#[utoipa::path(
    get,
    path = "/api/model",
    tag = "models",
    responses(
        (status = 200, description = "Latest model uid", body = LatestModelResponse),
        (status = 404, description = "Store is empty"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn latest_model(
    State(state): State<AppState>,
) -> Result<Json<LatestModelResponse>, GatewayError> {
    let model = state.store.latest().await.ok_or(GatewayError::NotFound)?;
    Ok(Json(LatestModelResponse {
        ok: true,
        uid: model.uid,
    }))
}

/// Delete a stored model
#[utoipa::path(
    delete,
    path = "/api/models/{uid}",
    tag = "models",
    params(("uid" = String, Path, description = "Catalog model uid")),
    responses(
        (status = 200, description = "Model deleted", body = DeleteModelResponse),
        (status = 404, description = "No such model"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn delete_model(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<DeleteModelResponse>, GatewayError> {
    if !state.store.delete(&uid).await {
        return Err(GatewayError::NotFound);
    }
    info!(uid = %uid, "Model deleted");

    Ok(Json(DeleteModelResponse {
        ok: true,
        deleted: 1,
    }))
}
