#![allow(clippy::missing_docs_in_private_items)]

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub mod cycle;
pub mod source;

pub use cycle::{CycleStats, CycleTuning, PollingService};
pub use source::{CatalogEntry, CatalogSource, PriceQuote, WikiApiSource};

/// Runs ingestion cycles until cancelled: one immediately, then one per
/// interval. A failed cycle is logged and the loop keeps going; only
/// cancellation stops it.
pub async fn run_polling_loop<S: CatalogSource>(
    service: PollingService<S>,
    interval: Duration,
    cancellation_token: CancellationToken,
) {
    info!(interval_secs = interval.as_secs(), "Starting ingestion loop");

    loop {
        match service.run_cycle().await {
            Ok(stats) => {
                info!(
                    created = stats.created,
                    updated = stats.updated,
                    prices_added = stats.prices_added,
                    "Ingestion cycle succeeded"
                );
            }
            Err(err) => {
                error!(error = %err, "Ingestion cycle failed; retrying next interval");
            }
        }

        tokio::select! {
            () = cancellation_token.cancelled() => {
                info!("Ingestion loop shutting down");
                break;
            }
            () = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, sync::Arc};

    use async_trait::async_trait;
    use common::{
        error::AppError, storage::db::SurrealDbClient, utils::embedding::EmbeddingProvider,
    };
    use uuid::Uuid;

    struct EmptySource;

    #[async_trait]
    impl CatalogSource for EmptySource {
        async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, AppError> {
            Ok(Vec::new())
        }

        async fn fetch_latest_prices(&self) -> Result<HashMap<i64, PriceQuote>, AppError> {
            Ok(HashMap::new())
        }
    }

    #[tokio::test]
    async fn loop_stops_on_cancellation_even_when_cycles_fail() {
        let db = SurrealDbClient::memory("loop_test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("memory db");
        db.ensure_initialized().await.expect("schema");

        let provider = Arc::new(EmbeddingProvider::new_hashed(16).expect("provider"));
        let service = PollingService::new(
            Arc::new(db),
            provider,
            EmptySource,
            CycleTuning::default(),
        );

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_polling_loop(
            service,
            Duration::from_secs(3600),
            token.clone(),
        ));

        // Give the first (failing) cycle a moment, then cancel.
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop should stop promptly")
            .expect("task should not panic");
    }
}
