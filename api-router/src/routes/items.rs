use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    storage::types::item::{Item, ItemFields},
    utils::searchable::build_indexable_text,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

/// Largest page size for item listings.
const MAX_LIST_LIMIT: i64 = 100;
const DEFAULT_LIST_LIMIT: i64 = 50;

/// Item as exposed over the API: catalog fields only, no stored vector,
/// with `buy_limit` echoed back under the upstream's `limit` name.
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemResponse {
    pub item_id: i64,
    pub name: String,
    pub examine: Option<String>,
    pub members: bool,
    pub lowalch: Option<i64>,
    pub highalch: Option<i64>,
    #[serde(rename = "limit")]
    pub buy_limit: Option<i64>,
    pub value: Option<i64>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            item_id: item.item_id,
            name: item.name,
            examine: item.examine,
            members: item.members,
            lowalch: item.lowalch,
            highalch: item.highalch,
            buy_limit: item.buy_limit,
            value: item.value,
            icon: item.icon,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListItemsParams {
    pub members_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateItemRequest {
    pub item_id: i64,
    pub name: String,
    pub examine: Option<String>,
    #[serde(default)]
    pub members: bool,
    pub lowalch: Option<i64>,
    pub highalch: Option<i64>,
    #[serde(rename = "limit")]
    pub buy_limit: Option<i64>,
    pub value: Option<i64>,
    pub icon: Option<String>,
}

impl CreateItemRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "Item name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn into_fields(self) -> ItemFields {
        ItemFields {
            item_id: self.item_id,
            name: self.name,
            examine: self.examine,
            members: self.members,
            lowalch: self.lowalch,
            highalch: self.highalch,
            buy_limit: self.buy_limit,
            value: self.value,
            icon: self.icon,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchCreateRequest {
    pub items: Vec<CreateItemRequest>,
}

#[derive(Debug, Serialize)]
pub struct BatchCreateFailure {
    pub item_id: i64,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BatchCreateResponse {
    pub created: Vec<ItemResponse>,
    pub failed: Vec<BatchCreateFailure>,
}

pub async fn list_items(
    State(state): State<ApiState>,
    Query(params): Query<ListItemsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(ApiError::ValidationError(format!(
            "limit must be between 1 and {MAX_LIST_LIMIT}"
        )));
    }

    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::ValidationError(
            "offset must not be negative".to_string(),
        ));
    }

    let items = Item::list(&state.db, params.members_only, limit, offset).await?;
    let items: Vec<ItemResponse> = items.into_iter().map(ItemResponse::from).collect();

    Ok(Json(items))
}

pub async fn get_item(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let item = Item::find_by_id(&state.db, item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Item not found".to_string()))?;

    Ok(Json(ItemResponse::from(item)))
}

/// Creates a single item, embedding it synchronously so it is searchable
/// as soon as the request returns.
pub async fn create_item(
    State(state): State<ApiState>,
    Json(request): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;

    let text = build_indexable_text(&request.name, request.examine.as_deref(), request.members);
    let embedding = state
        .embedding
        .embed(&text)
        .await
        .map_err(AppError::provider)?;

    let item = Item::create(&state.db, Item::new(request.into_fields(), Some(embedding))).await?;

    info!(item_id = item.item_id, "Created item via API");

    Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
}

/// Creates many items at once with a single embedding batch. Individual
/// failures (duplicate identity, bad fields) are reported per item; an
/// embedding failure rejects the whole batch since no item would get a
/// vector.
pub async fn create_items_batch(
    State(state): State<ApiState>,
    Json(request): Json<BatchCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.items.is_empty() {
        return Err(ApiError::ValidationError(
            "Batch must contain at least one item".to_string(),
        ));
    }

    let texts: Vec<String> = request
        .items
        .iter()
        .map(|item| build_indexable_text(&item.name, item.examine.as_deref(), item.members))
        .collect();

    let embeddings = state
        .embedding
        .embed_batch(texts, None)
        .await
        .map_err(AppError::provider)?;

    if embeddings.len() != request.items.len() {
        return Err(AppError::Provider(
            "embedding batch returned wrong row count".to_string(),
        )
        .into());
    }

    let mut created = Vec::new();
    let mut failed = Vec::new();

    for (entry, embedding) in request.items.into_iter().zip(embeddings) {
        let item_id = entry.item_id;

        if let Err(err) = entry.validate() {
            failed.push(BatchCreateFailure {
                item_id,
                error: err.to_string(),
            });
            continue;
        }

        match Item::create(&state.db, Item::new(entry.into_fields(), Some(embedding))).await {
            Ok(item) => created.push(ItemResponse::from(item)),
            Err(err) => failed.push(BatchCreateFailure {
                item_id,
                error: err.to_string(),
            }),
        }
    }

    info!(
        created = created.len(),
        failed = failed.len(),
        "Processed item batch via API"
    );

    Ok(Json(BatchCreateResponse { created, failed }))
}
