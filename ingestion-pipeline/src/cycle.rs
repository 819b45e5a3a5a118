use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{serialize_datetime, serialize_option_datetime},
    },
    utils::{embedding::EmbeddingProvider, searchable::build_indexable_text},
};

use crate::source::{CatalogEntry, CatalogSource, PriceQuote};

/// Knobs for one ingestion pass.
#[derive(Debug, Clone, Copy)]
pub struct CycleTuning {
    /// Maximum texts handed to the embedding backend per batch call.
    pub embed_batch_size: usize,
}

impl Default for CycleTuning {
    fn default() -> Self {
        Self {
            embed_batch_size: 500,
        }
    }
}

/// Counters reported after each ingestion pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub created: usize,
    pub updated: usize,
    pub prices_added: usize,
    pub embeddings_generated: usize,
    pub skipped_no_price: usize,
    pub embedding_failures: usize,
}

/// Periodic ingestion worker: fetches the catalog and latest prices, embeds
/// new or changed items, and persists everything in one transaction.
pub struct PollingService<S: CatalogSource> {
    db: Arc<SurrealDbClient>,
    embedding: Arc<EmbeddingProvider>,
    source: S,
    tuning: CycleTuning,
}

#[derive(Debug, Deserialize)]
struct ExistingRow {
    item_id: i64,
    name: String,
    examine: Option<String>,
    has_embedding: bool,
}

/// Catalog fields merged into an item row. `embedding` and `created_at`
/// are only serialized when present, so a MERGE leaves the stored values
/// untouched otherwise.
#[derive(Debug, Serialize)]
struct ItemMergeData {
    item_id: i64,
    name: String,
    examine: Option<String>,
    members: bool,
    lowalch: Option<i64>,
    highalch: Option<i64>,
    buy_limit: Option<i64>,
    value: Option<i64>,
    icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    created_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_datetime")]
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ItemPersistRow {
    item_id: i64,
    /// Set when a required re-embedding failed, so the stale vector is
    /// dropped and the row is picked up again next cycle.
    clear_embedding: bool,
    data: ItemMergeData,
}

#[derive(Debug, Serialize)]
struct PriceMergeData {
    item_id: i64,
    #[serde(serialize_with = "serialize_datetime")]
    timestamp: DateTime<Utc>,
    high_price: Option<i64>,
    low_price: Option<i64>,
}

#[derive(Debug, Serialize)]
struct PricePersistRow {
    id: String,
    data: PriceMergeData,
}

struct PendingItem {
    entry: CatalogEntry,
    quote: PriceQuote,
    is_new: bool,
    needs_embedding: bool,
    embedding: Option<Vec<f32>>,
}

impl<S: CatalogSource> PollingService<S> {
    pub fn new(
        db: Arc<SurrealDbClient>,
        embedding: Arc<EmbeddingProvider>,
        source: S,
        tuning: CycleTuning,
    ) -> Self {
        Self {
            db,
            embedding,
            source,
            tuning,
        }
    }

    /// Runs one full ingestion pass. Fetch failures abort the pass before
    /// any write; embedding failures degrade the affected rows and the pass
    /// continues.
    pub async fn run_cycle(&self) -> Result<CycleStats, AppError> {
        let (catalog, prices) =
            tokio::join!(self.source.fetch_catalog(), self.source.fetch_latest_prices());
        let catalog = catalog?;
        let prices = prices?;

        if catalog.is_empty() {
            return Err(AppError::Upstream(
                "catalog fetch returned no rows".to_string(),
            ));
        }

        let existing = self.load_existing_rows().await?;
        let mut stats = CycleStats::default();
        let mut pending = self.diff_catalog(catalog, &prices, &existing, &mut stats);

        self.embed_pending(&mut pending, &mut stats).await;
        self.persist(&pending, &mut stats).await?;

        info!(
            created = stats.created,
            updated = stats.updated,
            prices_added = stats.prices_added,
            embeddings_generated = stats.embeddings_generated,
            skipped_no_price = stats.skipped_no_price,
            embedding_failures = stats.embedding_failures,
            "Ingestion cycle complete"
        );

        Ok(stats)
    }

    async fn load_existing_rows(&self) -> Result<HashMap<i64, ExistingRow>, AppError> {
        let rows: Vec<ExistingRow> = self
            .db
            .client
            .query("SELECT item_id, name, examine, embedding != NONE AS has_embedding FROM item")
            .await?
            .take(0)?;
        Ok(rows.into_iter().map(|row| (row.item_id, row)).collect())
    }

    /// Pairs catalog entries with their price quote and decides which rows
    /// need a fresh vector. Entries without any price observation are
    /// skipped entirely: an item only enters the store once it has traded.
    fn diff_catalog(
        &self,
        catalog: Vec<CatalogEntry>,
        prices: &HashMap<i64, PriceQuote>,
        existing: &HashMap<i64, ExistingRow>,
        stats: &mut CycleStats,
    ) -> Vec<PendingItem> {
        let mut pending = Vec::with_capacity(prices.len());

        for entry in catalog {
            let Some(quote) = prices.get(&entry.id).copied() else {
                stats.skipped_no_price += 1;
                continue;
            };

            let (is_new, needs_embedding) = match existing.get(&entry.id) {
                None => (true, true),
                Some(row) => {
                    let changed = row.name != entry.name || row.examine != entry.examine;
                    (false, changed || !row.has_embedding)
                }
            };

            pending.push(PendingItem {
                entry,
                quote,
                is_new,
                needs_embedding,
                embedding: None,
            });
        }

        pending
    }

    /// Embeds every pending row flagged for it, in bounded batches. A failed
    /// batch leaves its rows without a vector and the cycle carries on.
    async fn embed_pending(&self, pending: &mut [PendingItem], stats: &mut CycleStats) {
        let indices: Vec<usize> = pending
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.needs_embedding.then_some(i))
            .collect();

        for chunk in indices.chunks(self.tuning.embed_batch_size.max(1)) {
            let texts: Vec<String> = chunk
                .iter()
                .map(|&i| {
                    let entry = &pending[i].entry;
                    build_indexable_text(&entry.name, entry.examine.as_deref(), entry.members)
                })
                .collect();

            match self
                .embedding
                .embed_batch(texts, Some(self.tuning.embed_batch_size))
                .await
            {
                Ok(vectors) if vectors.len() == chunk.len() => {
                    for (&i, vector) in chunk.iter().zip(vectors) {
                        pending[i].embedding = Some(vector);
                        stats.embeddings_generated += 1;
                    }
                }
                Ok(vectors) => {
                    warn!(
                        expected = chunk.len(),
                        received = vectors.len(),
                        "Embedding batch returned wrong row count; dropping batch"
                    );
                    stats.embedding_failures += chunk.len();
                }
                Err(err) => {
                    warn!(error = %err, batch = chunk.len(), "Embedding batch failed");
                    stats.embedding_failures += chunk.len();
                }
            }
        }
    }

    /// Writes all item merges and price observations in a single
    /// transaction, so a cycle is all-or-nothing from a reader's view.
    async fn persist(&self, pending: &[PendingItem], stats: &mut CycleStats) -> Result<(), AppError> {
        if pending.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut items = Vec::with_capacity(pending.len());
        let mut price_rows = Vec::with_capacity(pending.len());

        for item in pending {
            let entry = &item.entry;
            items.push(ItemPersistRow {
                item_id: entry.id,
                clear_embedding: item.needs_embedding && item.embedding.is_none() && !item.is_new,
                data: ItemMergeData {
                    item_id: entry.id,
                    name: entry.name.clone(),
                    examine: entry.examine.clone(),
                    members: entry.members,
                    lowalch: entry.lowalch,
                    highalch: entry.highalch,
                    buy_limit: entry.buy_limit,
                    value: entry.value,
                    icon: entry.icon.clone(),
                    embedding: item.embedding.clone(),
                    created_at: item.is_new.then_some(now),
                    updated_at: now,
                },
            });

            price_rows.push(PricePersistRow {
                id: Uuid::new_v4().to_string(),
                data: PriceMergeData {
                    item_id: entry.id,
                    timestamp: now,
                    high_price: item.quote.high,
                    low_price: item.quote.low,
                },
            });

            if item.is_new {
                stats.created += 1;
            } else {
                stats.updated += 1;
            }
        }

        stats.prices_added = price_rows.len();

        self.db
            .client
            .query(
                "BEGIN TRANSACTION; \
                 FOR $row IN $items { \
                     UPSERT type::thing('item', $row.item_id) MERGE $row.data; \
                     IF $row.clear_embedding { \
                         UPDATE type::thing('item', $row.item_id) SET embedding = NONE; \
                     }; \
                 }; \
                 FOR $price IN $prices { \
                     CREATE type::thing('price_history', $price.id) CONTENT $price.data; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("items", items))
            .bind(("prices", price_rows))
            .await?
            .check()?;

        Ok(())
    }
}
