//! In-memory document store for imported catalog models.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub uid: String,
    pub name: String,
    pub author: String,
    #[schema(value_type = Object)]
    pub thumbnails: Value,
    /// The catalog document exactly as fetched.
    #[schema(value_type = Object)]
    pub raw: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Build a record from a catalog `v3/models/{uid}` document.
    pub fn from_catalog(uid: &str, doc: Value, now: DateTime<Utc>) -> Self {
        let name = non_empty_str(&doc["name"]).unwrap_or(uid).to_string();
        let author = non_empty_str(&doc["user"]["displayName"])
            .or_else(|| non_empty_str(&doc["user"]["username"]))
            .unwrap_or("")
            .to_string();
        let thumbnails = match &doc["thumbnails"] {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };

        Self {
            uid: uid.to_string(),
            name,
            author,
            thumbnails,
            raw: doc,
            created_at: now,
            updated_at: now,
        }
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

#[derive(Default)]
pub struct ModelStore {
    models: RwLock<HashMap<String, Model>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by uid. A replaced record keeps its `created_at`.
    pub async fn upsert(&self, mut model: Model) -> Model {
        let mut models = self.models.write().await;
        if let Some(existing) = models.get(&model.uid) {
            model.created_at = existing.created_at;
        }
        models.insert(model.uid.clone(), model.clone());
        model
    }

    /// All models, most recently updated first.
    pub async fn list(&self) -> Vec<Model> {
        let mut models: Vec<Model> = self.models.read().await.values().cloned().collect();
        models.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        models
    }

    pub async fn get(&self, uid: &str) -> Option<Model> {
        self.models.read().await.get(uid).cloned()
    }

    pub async fn latest(&self) -> Option<Model> {
        self.models
            .read()
            .await
            .values()
            .max_by_key(|model| model.updated_at)
            .cloned()
    }

    /// Returns `true` when a record was removed.
    pub async fn delete(&self, uid: &str) -> bool {
        self.models.write().await.remove(uid).is_some()
    }

    pub async fn count(&self) -> usize {
        self.models.read().await.len()
    }
}
