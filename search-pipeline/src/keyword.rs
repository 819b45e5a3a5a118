use tracing::debug;

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::item::Item},
};

use crate::ranking::{cosine_similarity, SearchCandidate};

/// Candidates whose name contains every query token, case-insensitively.
///
/// Items with a stored vector get annotated with their true cosine
/// similarity to the query embedding; vectorless items score 0.0 on the
/// semantic axis and rely on keyword scoring alone.
pub async fn find_item_candidates_by_name(
    db: &SurrealDbClient,
    tokens: &[String],
    query_embedding: &[f32],
    take: usize,
    members_filter: Option<bool>,
) -> Result<Vec<SearchCandidate>, AppError> {
    if tokens.is_empty() || take == 0 {
        return Ok(Vec::new());
    }

    let mut conditions: Vec<String> = tokens
        .iter()
        .enumerate()
        .map(|(i, _)| format!("string::contains(string::lowercase(name), $token_{i})"))
        .collect();
    if members_filter.is_some() {
        conditions.push("members = $members".to_string());
    }

    let sql = format!(
        "SELECT * FROM item WHERE {} LIMIT {take}",
        conditions.join(" AND "),
    );

    debug!(token_count = tokens.len(), take, "Executing name-match query");

    let mut query = db.client.query(sql);
    for (i, token) in tokens.iter().enumerate() {
        query = query.bind((format!("token_{i}"), token.clone()));
    }
    if let Some(members) = members_filter {
        query = query.bind(("members", members));
    }

    let items: Vec<Item> = query.await?.take(0)?;

    let candidates = items
        .into_iter()
        .map(|item| {
            let similarity = item
                .embedding
                .as_deref()
                .map(|embedding| cosine_similarity(query_embedding, embedding))
                .unwrap_or(0.0);
            SearchCandidate { item, similarity }
        })
        .collect();

    Ok(candidates)
}
