use tracing::debug;

use common::{
    error::AppError,
    storage::db::SurrealDbClient,
    utils::{embedding::EmbeddingProvider, searchable::format_query},
};

use crate::{
    keyword::find_item_candidates_by_name,
    ranking::{rank_candidates, tokenize_query, RankedItem, RankingWeights},
    vector::find_item_candidates_by_vector,
};

/// Widest candidate pool fetched per path, regardless of requested limit.
const MAX_CANDIDATE_POOL: usize = 300;

/// Multiplier applied to the requested limit when sizing the candidate pool,
/// so re-ranking has enough rows to reorder.
const CANDIDATE_OVERSAMPLE: usize = 3;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub members_only: Option<bool>,
}

/// Runs the full hybrid search: embed the query, gather vector and
/// name-match candidates, then blend and rank them.
///
/// A failing embedding provider fails the whole search; queries must be
/// comparable against stored vectors to produce meaningful semantic scores.
pub async fn execute_search(
    db: &SurrealDbClient,
    provider: &EmbeddingProvider,
    request: &SearchRequest,
) -> Result<Vec<RankedItem>, AppError> {
    let formatted = format_query(&request.query);
    let query_embedding = provider
        .embed(&formatted)
        .await
        .map_err(AppError::provider)?;

    let pool = request
        .limit
        .saturating_mul(CANDIDATE_OVERSAMPLE)
        .min(MAX_CANDIDATE_POOL);
    let tokens = tokenize_query(&request.query);

    let (vector_candidates, keyword_candidates) = tokio::try_join!(
        find_item_candidates_by_vector(db, &query_embedding, pool, request.members_only),
        find_item_candidates_by_name(db, &tokens, &query_embedding, pool, request.members_only),
    )?;

    debug!(
        vector_candidates = vector_candidates.len(),
        keyword_candidates = keyword_candidates.len(),
        "Ranking search candidates"
    );

    Ok(rank_candidates(
        &request.query,
        vector_candidates,
        keyword_candidates,
        request.limit,
        RankingWeights::default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        storage::{
            indexes::ensure_runtime_indexes,
            types::item::{Item, ItemFields},
        },
        utils::searchable::build_indexable_text,
    };
    use uuid::Uuid;

    const DIMENSION: usize = 384;

    async fn search_fixture() -> (SurrealDbClient, EmbeddingProvider) {
        let db = SurrealDbClient::memory("search_test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("failed to start in-memory surrealdb");
        db.ensure_initialized().await.expect("schema should apply");
        ensure_runtime_indexes(&db, DIMENSION)
            .await
            .expect("runtime indexes");
        let provider = EmbeddingProvider::new_hashed(DIMENSION).expect("provider");
        (db, provider)
    }

    async fn insert_item(
        db: &SurrealDbClient,
        provider: &EmbeddingProvider,
        id: i64,
        name: &str,
        examine: Option<&str>,
        members: bool,
    ) {
        let text = build_indexable_text(name, examine, members);
        let embedding = provider.embed(&text).await.expect("embed");
        let fields = ItemFields {
            item_id: id,
            name: name.to_string(),
            examine: examine.map(ToOwned::to_owned),
            members,
            ..ItemFields::default()
        };
        Item::create(db, Item::new(fields, Some(embedding)))
            .await
            .expect("create item");
    }

    fn request(query: &str, limit: usize, members_only: Option<bool>) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            limit,
            members_only,
        }
    }

    #[tokio::test]
    async fn name_match_ranks_first_for_short_query() {
        let (db, provider) = search_fixture().await;

        insert_item(&db, &provider, 1305, "Dragon longsword", Some("A very powerful sword."), true).await;
        insert_item(&db, &provider, 1215, "Dragon dagger", Some("A powerful dagger."), true).await;
        insert_item(&db, &provider, 379, "Lobster", Some("Mmm, tasty."), false).await;

        let results = execute_search(&db, &provider, &request("dragon long", 10, None))
            .await
            .expect("search");

        assert!(!results.is_empty());
        assert_eq!(results[0].item.item_id, 1305);
        assert!(results[0].score > results.last().map(|r| r.score).unwrap_or(0.0));
    }

    #[tokio::test]
    async fn results_respect_limit() {
        let (db, provider) = search_fixture().await;

        for id in 0..8 {
            insert_item(&db, &provider, id, &format!("Dragon item {id}"), None, false).await;
        }

        let results = execute_search(&db, &provider, &request("dragon", 3, None))
            .await
            .expect("search");

        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn members_only_filter_applies_to_both_paths() {
        let (db, provider) = search_fixture().await;

        insert_item(&db, &provider, 1, "Dragon longsword", None, true).await;
        insert_item(&db, &provider, 2, "Dragon dagger", None, false).await;

        let results = execute_search(&db, &provider, &request("dragon", 10, Some(false)))
            .await
            .expect("search");

        assert!(!results.is_empty());
        assert!(results.iter().all(|r| !r.item.members));
    }

    #[tokio::test]
    async fn description_prefix_targets_examine_text() {
        let (db, provider) = search_fixture().await;

        insert_item(&db, &provider, 1, "Shark", Some("A deadly fish found in the ocean."), false).await;
        insert_item(&db, &provider, 2, "Bronze sword", Some("A basic sword."), false).await;

        let results = execute_search(
            &db,
            &provider,
            &request("description: a deadly fish found in the ocean", 2, None),
        )
        .await
        .expect("search");

        assert!(!results.is_empty());
        assert_eq!(results[0].item.item_id, 1);
    }

    #[tokio::test]
    async fn empty_catalog_returns_no_results() {
        let (db, provider) = search_fixture().await;

        let results = execute_search(&db, &provider, &request("anything", 10, None))
            .await
            .expect("search");

        assert!(results.is_empty());
    }
}
