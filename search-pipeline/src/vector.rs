use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::item::Item},
};

use crate::ranking::{clamp_unit, SearchCandidate};

/// HNSW search width for the KNN operator.
const KNN_EF: usize = 40;

#[derive(Debug, Deserialize)]
struct KnnScoreRow {
    item_id: i64,
    distance: Option<f32>,
}

/// Nearest-neighbour candidates by cosine distance over the item embeddings.
///
/// Rows without a stored vector never appear. Results are ordered by
/// ascending distance; each carries `similarity = 1 - distance` clamped to
/// [0,1].
pub async fn find_item_candidates_by_vector(
    db: &SurrealDbClient,
    query_embedding: &[f32],
    take: usize,
    members_filter: Option<bool>,
) -> Result<Vec<SearchCandidate>, AppError> {
    if take == 0 || query_embedding.is_empty() {
        return Ok(Vec::new());
    }

    let members_clause = if members_filter.is_some() {
        "AND members = $members "
    } else {
        ""
    };

    let sql = format!(
        "SELECT item_id, vector::distance::knn() AS distance FROM item \
         WHERE embedding != NONE {members_clause}AND embedding <|{take},{KNN_EF}|> {embedding} \
         ORDER BY distance",
        embedding = format_embedding(query_embedding),
    );

    debug!(take, has_members_filter = members_filter.is_some(), "Executing KNN query");

    let mut query = db.client.query(sql);
    if let Some(members) = members_filter {
        query = query.bind(("members", members));
    }

    let score_rows: Vec<KnnScoreRow> = query.await?.take(0)?;

    if score_rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = score_rows.iter().map(|row| row.item_id).collect();

    let items: Vec<Item> = db
        .client
        .query("SELECT * FROM item WHERE item_id IN $ids")
        .bind(("ids", ids))
        .await?
        .take(0)?;

    let mut item_map: HashMap<i64, Item> = items
        .into_iter()
        .map(|item| (item.item_id, item))
        .collect();

    let mut candidates = Vec::with_capacity(score_rows.len());
    for row in score_rows {
        if let Some(item) = item_map.remove(&row.item_id) {
            let similarity = clamp_unit(1.0 - row.distance.unwrap_or(1.0));
            candidates.push(SearchCandidate { item, similarity });
        }
    }

    Ok(candidates)
}

fn format_embedding(embedding: &[f32]) -> String {
    format!("{embedding:?}")
}
