use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{deserialize_datetime, deserialize_id, item::Item, serialize_datetime, StoredObject},
    },
    utils::embedding::EmbeddingProvider,
};

/// Record id of the singleton settings row.
const SETTINGS_ID: &str = "current";

/// Singleton record describing the embedding configuration the stored
/// vectors were produced with. Vectors are only comparable while every one
/// of them shares the active provider's dimension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemSettings {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub embedding_backend: String,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: u32,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub updated_at: DateTime<Utc>,
}

impl StoredObject for SystemSettings {
    fn table_name() -> &'static str {
        "system_settings"
    }
}

impl SystemSettings {
    pub async fn get_current(db: &SurrealDbClient) -> Result<Option<Self>, AppError> {
        let settings: Option<Self> = db.client.select((Self::table_name(), SETTINGS_ID)).await?;
        Ok(settings)
    }

    /// Records the active provider's backend/model/dimension and reports
    /// whether the stored dimension changed.
    ///
    /// On a dimension change every stored vector is dropped: vectors of the
    /// old width cannot be compared with new query embeddings, so the next
    /// ingestion cycle performs the full re-embedding pass.
    pub async fn sync_from_embedding_provider(
        db: &SurrealDbClient,
        provider: &EmbeddingProvider,
    ) -> Result<(Self, bool), AppError> {
        let dimension = provider.dimension() as u32;
        let previous = Self::get_current(db).await?;
        let dimensions_changed = previous
            .as_ref()
            .is_some_and(|settings| settings.embedding_dimensions != dimension);

        if dimensions_changed {
            warn!(
                previous_dimensions = previous.as_ref().map(|s| s.embedding_dimensions),
                new_dimensions = dimension,
                "Embedding dimension changed; clearing stored vectors for re-embedding"
            );
            Item::clear_all_embeddings(db).await?;
        }

        let settings = Self {
            id: SETTINGS_ID.to_string(),
            embedding_backend: provider.backend_label().to_string(),
            embedding_model: provider.model_code(),
            embedding_dimensions: dimension,
            updated_at: Utc::now(),
        };

        let _: Option<Self> = db
            .client
            .upsert((Self::table_name(), SETTINGS_ID))
            .content(settings.clone())
            .await?;

        Ok((settings, dimensions_changed))
    }
}
