use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{deserialize_datetime, deserialize_id, serialize_datetime, StoredObject},
    },
};

/// One price observation for one item at one instant. Append-only: rows are
/// never mutated, and repeated identical snapshots are valid observations in
/// time. At least one of the two prices is always present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceHistory {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub item_id: i64,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub timestamp: DateTime<Utc>,
    pub high_price: Option<i64>,
    pub low_price: Option<i64>,
}

impl StoredObject for PriceHistory {
    fn table_name() -> &'static str {
        "price_history"
    }
}

impl PriceHistory {
    pub fn new(
        item_id: i64,
        high_price: Option<i64>,
        low_price: Option<i64>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            item_id,
            timestamp,
            high_price,
            low_price,
        }
    }

    pub async fn append(db: &SurrealDbClient, row: PriceHistory) -> Result<(), AppError> {
        let _: Option<PriceHistory> = db
            .client
            .create((Self::table_name(), row.id.clone()))
            .content(row)
            .await?;
        Ok(())
    }

    /// Price rows for an item, newest first.
    pub async fn history_for_item(
        db: &SurrealDbClient,
        item_id: i64,
        limit: i64,
    ) -> Result<Vec<PriceHistory>, AppError> {
        let rows: Vec<PriceHistory> = db
            .client
            .query(
                "SELECT * FROM price_history WHERE item_id = $item_id \
                 ORDER BY timestamp DESC LIMIT $limit",
            )
            .bind(("item_id", item_id))
            .bind(("limit", limit))
            .await?
            .take(0)?;
        Ok(rows)
    }

    pub async fn latest_for_item(
        db: &SurrealDbClient,
        item_id: i64,
    ) -> Result<Option<PriceHistory>, AppError> {
        let rows = Self::history_for_item(db, item_id, 1).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn count_for_item(db: &SurrealDbClient, item_id: i64) -> Result<u64, AppError> {
        #[derive(Deserialize)]
        struct CountRow {
            count: u64,
        }

        let rows: Vec<CountRow> = db
            .client
            .query("SELECT count() AS count FROM price_history WHERE item_id = $item_id GROUP ALL")
            .bind(("item_id", item_id))
            .await?
            .take(0)?;
        Ok(rows.first().map(|r| r.count).unwrap_or(0))
    }
}
