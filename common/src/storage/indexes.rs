use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::{error::AppError, storage::db::SurrealDbClient};

const ITEM_HNSW_INDEX: &str = "idx_item_embedding";
const ITEM_HNSW_OPTIONS: &str = "DIST COSINE TYPE F32 EFC 100 M 8";

/// Builds the runtime Surreal indexes for the catalog.
///
/// Idempotent: safe to call multiple times; the HNSW definition is
/// overwritten when the embedding dimension changes.
pub async fn ensure_runtime_indexes(
    db: &SurrealDbClient,
    embedding_dimension: usize,
) -> Result<(), AppError> {
    ensure_runtime_indexes_inner(db, embedding_dimension)
        .await
        .map_err(|err| AppError::InternalError(err.to_string()))
}

async fn ensure_runtime_indexes_inner(
    db: &SurrealDbClient,
    embedding_dimension: usize,
) -> Result<()> {
    db.client
        .query("DEFINE INDEX IF NOT EXISTS idx_item_members ON TABLE item FIELDS members;")
        .await
        .context("defining members index")?
        .check()
        .context("members index definition failed")?;

    db.client
        .query(
            "DEFINE INDEX IF NOT EXISTS idx_price_history_item ON TABLE price_history FIELDS item_id;",
        )
        .await
        .context("defining price history item index")?
        .check()
        .context("price history item index definition failed")?;

    db.client
        .query(
            "DEFINE INDEX IF NOT EXISTS idx_price_history_timestamp ON TABLE price_history FIELDS timestamp;",
        )
        .await
        .context("defining price history timestamp index")?
        .check()
        .context("price history timestamp index definition failed")?;

    ensure_hnsw_index(db, embedding_dimension).await
}

async fn ensure_hnsw_index(db: &SurrealDbClient, dimension: usize) -> Result<()> {
    let definition = match hnsw_index_state(db, dimension).await? {
        HnswIndexState::Missing | HnswIndexState::Matches(_) => format!(
            "DEFINE INDEX IF NOT EXISTS {ITEM_HNSW_INDEX} ON TABLE item \
             FIELDS embedding HNSW DIMENSION {dimension} {ITEM_HNSW_OPTIONS};"
        ),
        HnswIndexState::Different(existing) => {
            info!(
                index = ITEM_HNSW_INDEX,
                existing_dimension = existing,
                target_dimension = dimension,
                "Overwriting HNSW index to match new embedding dimension"
            );
            format!(
                "DEFINE INDEX OVERWRITE {ITEM_HNSW_INDEX} ON TABLE item \
                 FIELDS embedding HNSW DIMENSION {dimension} {ITEM_HNSW_OPTIONS};"
            )
        }
    };

    db.client
        .query(definition)
        .await
        .context("defining item embedding HNSW index")?
        .check()
        .context("HNSW index definition failed")?;

    Ok(())
}

async fn hnsw_index_state(db: &SurrealDbClient, expected_dimension: usize) -> Result<HnswIndexState> {
    let mut response = db
        .client
        .query("INFO FOR TABLE item;")
        .await
        .context("fetching table info for item")?;

    let info: surrealdb::Value = response
        .take(0)
        .context("failed to take table info response")?;

    let info_json: Value =
        serde_json::to_value(info).context("serializing table info to JSON for parsing")?;

    let Some(indexes) = info_json
        .get("Object")
        .and_then(|o| o.get("indexes"))
        .and_then(|i| i.get("Object"))
        .and_then(|i| i.as_object())
    else {
        return Ok(HnswIndexState::Missing);
    };

    let Some(definition) = indexes
        .get(ITEM_HNSW_INDEX)
        .and_then(|details| details.get("Strand"))
        .and_then(|v| v.as_str())
    else {
        return Ok(HnswIndexState::Missing);
    };

    let Some(current_dimension) = extract_dimension(definition) else {
        return Ok(HnswIndexState::Missing);
    };

    if current_dimension == expected_dimension as u64 {
        Ok(HnswIndexState::Matches(current_dimension))
    } else {
        Ok(HnswIndexState::Different(current_dimension))
    }
}

enum HnswIndexState {
    Missing,
    Matches(u64),
    Different(u64),
}

fn extract_dimension(definition: &str) -> Option<u64> {
    definition
        .split("DIMENSION")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|token| token.trim_end_matches(';').parse::<u64>().ok())
}
