#![allow(clippy::missing_docs_in_private_items)]

use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{
    items::{create_item, create_items_batch, get_item, list_items},
    liveness::live,
    prices::{get_current_price, get_price_history},
    readiness::ready,
    search::search_items,
};

pub mod api_state;
pub mod error;
pub mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probe endpoints (for k8s/systemd probes)
    let probes = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let catalog = Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/batch", post(create_items_batch))
        .route("/items/search", post(search_items))
        .route("/items/{item_id}", get(get_item))
        .route("/items/{item_id}/prices", get(get_price_history))
        .route("/items/{item_id}/price/current", get(get_current_price));

    probes.merge(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::{
        storage::{db::SurrealDbClient, indexes::ensure_runtime_indexes},
        utils::{config::AppConfig, embedding::EmbeddingProvider},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    const DIMENSION: usize = 64;

    async fn test_app() -> Router {
        let db = SurrealDbClient::memory("api_test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("memory db");
        db.ensure_initialized().await.expect("schema");
        ensure_runtime_indexes(&db, DIMENSION)
            .await
            .expect("indexes");

        let provider = EmbeddingProvider::new_hashed(DIMENSION).expect("provider");
        let state = ApiState::new(Arc::new(db), AppConfig::default(), Arc::new(provider));

        api_routes_v1().with_state(state)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn item_body(item_id: i64, name: &str, members: bool) -> Value {
        json!({
            "item_id": item_id,
            "name": name,
            "examine": "A test item.",
            "members": members,
            "limit": 70,
            "value": 100
        })
    }

    #[tokio::test]
    async fn probes_respond_ok() {
        let app = test_app().await;

        let live = app.clone().oneshot(get_request("/live")).await.expect("live");
        assert_eq!(live.status(), StatusCode::OK);

        let ready = app.oneshot(get_request("/ready")).await.expect("ready");
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_then_fetch_item() {
        let app = test_app().await;

        let created = app
            .clone()
            .oneshot(json_request("POST", "/items", item_body(4151, "Abyssal whip", true)))
            .await
            .expect("create");
        assert_eq!(created.status(), StatusCode::CREATED);

        let body = body_json(created).await;
        assert_eq!(body["item_id"], 4151);
        assert_eq!(body["limit"], 70);
        assert!(body.get("embedding").is_none());

        let fetched = app.oneshot(get_request("/items/4151")).await.expect("get");
        assert_eq!(fetched.status(), StatusCode::OK);
        let body = body_json(fetched).await;
        assert_eq!(body["name"], "Abyssal whip");
    }

    #[tokio::test]
    async fn duplicate_item_returns_conflict() {
        let app = test_app().await;

        let first = app
            .clone()
            .oneshot(json_request("POST", "/items", item_body(1, "Bronze dagger", false)))
            .await
            .expect("first");
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(json_request("POST", "/items", item_body(1, "Bronze dagger", false)))
            .await
            .expect("second");
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let app = test_app().await;

        let response = app.oneshot(get_request("/items/9999")).await.expect("get");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_validates_and_ranks() {
        let app = test_app().await;

        for (id, name) in [(1305, "Dragon longsword"), (1215, "Dragon dagger"), (379, "Lobster")] {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/items", item_body(id, name, false)))
                .await
                .expect("create");
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let empty = app
            .clone()
            .oneshot(json_request("POST", "/items/search", json!({"query": "   "})))
            .await
            .expect("search");
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let bad_limit = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/items/search",
                json!({"query": "dragon", "limit": 0}),
            ))
            .await
            .expect("search");
        assert_eq!(bad_limit.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_request(
                "POST",
                "/items/search",
                json!({"query": "dragon long", "limit": 5}),
            ))
            .await
            .expect("search");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["query"], "dragon long");
        assert!(body["total"].as_u64().expect("total") >= 1);
        assert_eq!(body["results"][0]["item"]["item_id"], 1305);
    }

    #[tokio::test]
    async fn batch_create_reports_partial_failures() {
        let app = test_app().await;

        let seeded = app
            .clone()
            .oneshot(json_request("POST", "/items", item_body(1, "Existing item", false)))
            .await
            .expect("seed");
        assert_eq!(seeded.status(), StatusCode::CREATED);

        let response = app
            .oneshot(json_request(
                "POST",
                "/items/batch",
                json!({"items": [
                    item_body(1, "Existing item", false),
                    item_body(2, "New item", false),
                    item_body(3, "", false)
                ]}),
            ))
            .await
            .expect("batch");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["created"].as_array().expect("created").len(), 1);
        assert_eq!(body["created"][0]["item_id"], 2);
        assert_eq!(body["failed"].as_array().expect("failed").len(), 2);
    }

    #[tokio::test]
    async fn price_endpoints_distinguish_missing_item_from_missing_data() {
        let app = test_app().await;

        let created = app
            .clone()
            .oneshot(json_request("POST", "/items", item_body(7, "Oak logs", false)))
            .await
            .expect("create");
        assert_eq!(created.status(), StatusCode::CREATED);

        // Unknown item
        let response = app
            .clone()
            .oneshot(get_request("/items/999/price/current"))
            .await
            .expect("current");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Item not found");

        // Known item without observations
        let response = app
            .clone()
            .oneshot(get_request("/items/7/price/current"))
            .await
            .expect("current");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "No price data available for this item");

        // Empty history for a known item is an empty list, not an error
        let response = app
            .oneshot(get_request("/items/7/prices"))
            .await
            .expect("history");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body.as_array().expect("rows").is_empty());
    }

    #[tokio::test]
    async fn list_items_pages_and_filters() {
        let app = test_app().await;

        for (id, name, members) in [
            (1, "Bronze dagger", false),
            (2, "Dragon scimitar", true),
            (3, "Rune platebody", false),
        ] {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/items", item_body(id, name, members)))
                .await
                .expect("create");
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(get_request("/items?members_only=true"))
            .await
            .expect("list");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().expect("items").len(), 1);
        assert_eq!(body[0]["item_id"], 2);

        let bad_limit = app
            .oneshot(get_request("/items?limit=1000"))
            .await
            .expect("list");
        assert_eq!(bad_limit.status(), StatusCode::BAD_REQUEST);
    }
}
