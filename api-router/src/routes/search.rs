use axum::{extract::State, response::IntoResponse, Json};
use search_pipeline::{execute_search, SearchRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError, routes::items::ItemResponse};

const MAX_QUERY_CHARS: usize = 500;
const MAX_SEARCH_LIMIT: usize = 100;
const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    pub limit: Option<usize>,
    pub members_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub item: ItemResponse,
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub query: String,
}

pub async fn search_items(
    State(state): State<ApiState>,
    Json(body): Json<SearchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let query = body.query.trim();
    if query.is_empty() {
        return Err(ApiError::ValidationError(
            "Search query must not be empty".to_string(),
        ));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(ApiError::ValidationError(format!(
            "Search query must be at most {MAX_QUERY_CHARS} characters"
        )));
    }

    let limit = body.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
        return Err(ApiError::ValidationError(format!(
            "limit must be between 1 and {MAX_SEARCH_LIMIT}"
        )));
    }

    let request = SearchRequest {
        query: query.to_string(),
        limit,
        members_only: body.members_only,
    };

    let ranked = execute_search(&state.db, &state.embedding, &request).await?;

    info!(
        query = %request.query,
        results = ranked.len(),
        "Handled item search"
    );

    let results: Vec<SearchHit> = ranked
        .into_iter()
        .map(|entry| SearchHit {
            item: ItemResponse::from(entry.item),
            score: entry.score,
        })
        .collect();

    let total = results.len();
    Ok(Json(SearchResponse {
        results,
        total,
        query: request.query,
    }))
}
