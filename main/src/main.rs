use std::{sync::Arc, time::Duration};

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::{
    storage::{db::SurrealDbClient, indexes::ensure_runtime_indexes, types::system_settings::SystemSettings},
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::{run_polling_loop, CycleTuning, PollingService, WikiApiSource};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    // Ensure db is initialized
    db.ensure_initialized().await?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    // Create embedding provider based on config before syncing settings.
    let embedding_provider =
        Arc::new(EmbeddingProvider::from_config(&config, Some(openai_client)).await?);
    info!(
        embedding_backend = ?config.embedding_backend,
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    // Sync SystemSettings with provider's dimensions/model/backend. A
    // dimension change clears stored vectors; the first ingestion cycle
    // re-embeds the whole catalog.
    let (settings, dimensions_changed) =
        SystemSettings::sync_from_embedding_provider(&db, &embedding_provider).await?;
    if dimensions_changed {
        warn!(
            new_dimensions = settings.embedding_dimensions,
            "Embedding configuration changed; catalog will be re-embedded"
        );
    }

    // Now ensure runtime indexes with the correct (synced) dimensions
    ensure_runtime_indexes(&db, settings.embedding_dimensions as usize).await?;

    // Start the ingestion loop before serving: the first cycle runs
    // immediately so a fresh deployment has data as soon as possible.
    let source = WikiApiSource::from_config(&config)?;
    let polling_service = PollingService::new(
        db.clone(),
        embedding_provider.clone(),
        source,
        CycleTuning::default(),
    );
    let cancellation_token = CancellationToken::new();
    let worker_token = cancellation_token.clone();
    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    let worker_handle = tokio::spawn(run_polling_loop(
        polling_service,
        poll_interval,
        worker_token,
    ));

    let api_state = ApiState::new(db, config.clone(), embedding_provider);
    let app = Router::new()
        .nest("/api/v1", api_routes_v1())
        .with_state(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;

    let shutdown_token = cancellation_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {e}");
            }
            info!("Shutdown signal received");
            shutdown_token.cancel();
        })
        .await?;

    cancellation_token.cancel();
    if let Err(e) = worker_handle.await {
        error!("Ingestion task panicked: {e:?}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    #[tokio::test]
    async fn smoke_startup_with_in_memory_surrealdb() {
        let namespace = "test_ns";
        let database = format!("test_db_{}", Uuid::new_v4());

        let db = Arc::new(
            SurrealDbClient::memory(namespace, &database)
                .await
                .expect("failed to start in-memory surrealdb"),
        );
        db.ensure_initialized()
            .await
            .expect("failed to initialize schema");

        // Use hashed embeddings for tests to avoid external dependencies
        let embedding_provider = Arc::new(
            EmbeddingProvider::new_hashed(384).expect("failed to create hashed embedding provider"),
        );

        let (settings, _) = SystemSettings::sync_from_embedding_provider(&db, &embedding_provider)
            .await
            .expect("failed to sync settings");
        ensure_runtime_indexes(&db, settings.embedding_dimensions as usize)
            .await
            .expect("failed to build indexes");

        let api_state = ApiState::new(
            db,
            common::utils::config::AppConfig::default(),
            embedding_provider,
        );

        let app = Router::new()
            .nest("/api/v1", api_routes_v1())
            .with_state(api_state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/live")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let ready_response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("ready response");
        assert_eq!(ready_response.status(), StatusCode::OK);
    }
}
