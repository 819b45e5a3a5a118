use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{deserialize_datetime, serialize_datetime, StoredObject},
    },
};

/// One tradeable catalog item, keyed by the stable upstream identity.
///
/// An item row exists only once a price observation has been seen for it;
/// `embedding` stays absent when every embedding attempt for the row has
/// failed so far, which excludes it from vector search until a later
/// ingestion cycle succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub item_id: i64,
    pub name: String,
    pub examine: Option<String>,
    pub members: bool,
    pub lowalch: Option<i64>,
    pub highalch: Option<i64>,
    /// Upstream `limit` field; stored under a different name because LIMIT
    /// is a SurrealQL keyword.
    pub buy_limit: Option<i64>,
    pub value: Option<i64>,
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub created_at: DateTime<Utc>,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub updated_at: DateTime<Utc>,
}

impl StoredObject for Item {
    fn table_name() -> &'static str {
        "item"
    }
}

/// Writable catalog fields, shared by the create endpoints and ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ItemFields {
    pub item_id: i64,
    pub name: String,
    pub examine: Option<String>,
    #[serde(default)]
    pub members: bool,
    pub lowalch: Option<i64>,
    pub highalch: Option<i64>,
    pub buy_limit: Option<i64>,
    pub value: Option<i64>,
    pub icon: Option<String>,
}

impl Item {
    pub fn new(fields: ItemFields, embedding: Option<Vec<f32>>) -> Self {
        let now = Utc::now();
        Self {
            item_id: fields.item_id,
            name: fields.name,
            examine: fields.examine,
            members: fields.members,
            lowalch: fields.lowalch,
            highalch: fields.highalch,
            buy_limit: fields.buy_limit,
            value: fields.value,
            icon: fields.icon,
            embedding,
            created_at: now,
            updated_at: now,
        }
    }

    /// Inserts a new item, rejecting identities that already exist.
    pub async fn create(db: &SurrealDbClient, item: Item) -> Result<Item, AppError> {
        if Self::find_by_id(db, item.item_id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Item with item_id {} already exists",
                item.item_id
            )));
        }

        let stored: Option<Item> = db
            .client
            .create((Self::table_name(), item.item_id))
            .content(item)
            .await?;

        stored.ok_or_else(|| {
            AppError::InternalError("item insert returned no record".to_string())
        })
    }

    pub async fn find_by_id(db: &SurrealDbClient, item_id: i64) -> Result<Option<Item>, AppError> {
        let item: Option<Item> = db.client.select((Self::table_name(), item_id)).await?;
        Ok(item)
    }

    pub async fn list(
        db: &SurrealDbClient,
        members_only: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Item>, AppError> {
        let sql = match members_only {
            Some(_) => {
                "SELECT * FROM item WHERE members = $members ORDER BY item_id LIMIT $limit START $offset"
            }
            None => "SELECT * FROM item ORDER BY item_id LIMIT $limit START $offset",
        };

        let mut query = db.client.query(sql).bind(("limit", limit)).bind(("offset", offset));
        if let Some(members) = members_only {
            query = query.bind(("members", members));
        }

        let items: Vec<Item> = query.await?.take(0)?;
        Ok(items)
    }

    /// Drops every stored vector. Used when the embedding dimension changes
    /// so the next ingestion cycle re-embeds the whole catalog.
    pub async fn clear_all_embeddings(db: &SurrealDbClient) -> Result<(), AppError> {
        db.client
            .query("UPDATE item SET embedding = NONE")
            .await?
            .check()?;
        Ok(())
    }
}
