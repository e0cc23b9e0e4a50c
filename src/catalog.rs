//! Client for the third-party model catalog.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::{config::CatalogConfig, error::GatewayError};

#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("model-gallery/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the catalog document for `uid`.
    pub async fn fetch_model(&self, uid: &str) -> Result<Value, GatewayError> {
        if !is_valid_uid(uid) {
            return Err(GatewayError::InvalidUid(uid.to_string()));
        }

        let url = format!("{}/v3/models/{}", self.base_url, uid);
        debug!(url = %url, "Fetching catalog model");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(uid, status = status.as_u16(), "Catalog fetch failed");
            return Err(GatewayError::CatalogStatus(status));
        }

        Ok(response.json().await?)
    }
}

/// Catalog uids are opaque tokens; anything that could change the request
/// path is refused.
fn is_valid_uid(uid: &str) -> bool {
    !uid.is_empty()
        && uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
