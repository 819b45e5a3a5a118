use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use common::storage::types::{item::Item, price_history::PriceHistory};
use serde::{Deserialize, Serialize};

use crate::{api_state::ApiState, error::ApiError};

const MAX_HISTORY_LIMIT: i64 = 1000;
const DEFAULT_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub item_id: i64,
    pub timestamp: DateTime<Utc>,
    pub high_price: Option<i64>,
    pub low_price: Option<i64>,
}

impl From<PriceHistory> for PriceResponse {
    fn from(row: PriceHistory) -> Self {
        Self {
            item_id: row.item_id,
            timestamp: row.timestamp,
            high_price: row.high_price,
            low_price: row.low_price,
        }
    }
}

/// Price history for one item, newest first.
pub async fn get_price_history(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(ApiError::ValidationError(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    ensure_item_exists(&state, item_id).await?;

    let rows = PriceHistory::history_for_item(&state.db, item_id, limit).await?;
    let rows: Vec<PriceResponse> = rows.into_iter().map(PriceResponse::from).collect();

    Ok(Json(rows))
}

/// Latest observation for one item. An item with no observations yet is
/// distinguishable from an unknown item.
pub async fn get_current_price(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_item_exists(&state, item_id).await?;

    let latest = PriceHistory::latest_for_item(&state.db, item_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("No price data available for this item".to_string())
        })?;

    Ok(Json(PriceResponse::from(latest)))
}

async fn ensure_item_exists(state: &ApiState, item_id: i64) -> Result<(), ApiError> {
    Item::find_by_id(&state.db, item_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound("Item not found".to_string()))
}
