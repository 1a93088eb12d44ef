//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/v1/scheduler/start", post(api::scheduler_start))
        .route("/api/v1/scheduler/stop", post(api::scheduler_stop))
        .route("/api/v1/messages/sent", get(api::sent_messages))
        .route("/api/v1/messages/failed", get(api::failed_messages))
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::doc::ApiDoc::openapi()))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use herald_core::config::DeliveryConfig;
    use herald_core::{Message, MessageStatus};
    use herald_dispatch::{ClientTimeouts, DeliveryUnit, HttpDeliveryClient, Scheduler, SchedulerSettings};
    use herald_storage::{MemoryCache, MemoryMessageStore};

    struct Fixture {
        store: Arc<MemoryMessageStore>,
        cache: Arc<MemoryCache>,
        state: Arc<AppState>,
    }

    fn delivered(id: i64, status: MessageStatus, secs: i64) -> Message {
        Message {
            status,
            sent_at: Utc.timestamp_opt(1_760_000_000 + secs, 0).single(),
            ..Message::pending(id, format!("+9055500000{id:02}"), format!("message {id}"))
        }
    }

    fn fixture(messages: Vec<Message>) -> Fixture {
        let store = Arc::new(MemoryMessageStore::new());
        for m in messages {
            store.insert(m);
        }
        let cache = Arc::new(MemoryCache::new());

        let config = DeliveryConfig {
            webhook_url: "http://127.0.0.1:9/hook".to_string(),
            send_interval: Duration::from_secs(120),
            batch_size: 2,
            max_message_length: 160,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            cache_key_prefix: "herald:msg:sent".to_string(),
        };
        let client = HttpDeliveryClient::new(
            &config.webhook_url,
            ClientTimeouts::for_interval(config.send_interval),
        )
        .unwrap();
        let unit = DeliveryUnit::new(store.clone(), cache.clone(), Arc::new(client), &config);
        let scheduler = Scheduler::new(store.clone(), unit, SchedulerSettings::from(&config));

        let state = Arc::new(AppState {
            store: store.clone(),
            cache: cache.clone(),
            scheduler,
        });
        Fixture { store, cache, state }
    }

    async fn call_raw(state: &Arc<AppState>, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn call(state: &Arc<AppState>, method: Method, uri: &str) -> (StatusCode, Value) {
        let (status, bytes) = call_raw(state, method, uri).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_services() {
        let f = fixture(vec![]);
        let (status, body) = call(&f.state, Method::GET, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["database"], "healthy");
        assert_eq!(body["services"]["redis"], "healthy");
        assert_eq!(body["services"]["scheduler"], "stopped");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn health_uses_redis_key_for_cache() {
        let f = fixture(vec![]);
        let (_, body) = call(&f.state, Method::GET, "/health").await;

        let keys: Vec<&str> = body["services"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["database", "redis", "scheduler"]);
    }

    #[tokio::test]
    async fn docs_page_is_served() {
        let f = fixture(vec![]);
        let (status, body) = call_raw(&f.state, Method::GET, "/docs").await;

        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("/api/v1/messages/sent"));
    }

    #[tokio::test]
    async fn health_is_unavailable_when_store_is_down() {
        let f = fixture(vec![]);
        f.store.fail_reads(true);

        let (status, body) = call(&f.state, Method::GET, "/health").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert!(body["services"]["database"]
            .as_str()
            .unwrap()
            .starts_with("unhealthy"));
    }

    #[tokio::test]
    async fn cache_outage_does_not_fail_health() {
        let f = fixture(vec![]);
        f.cache.fail(true);

        let (status, body) = call(&f.state, Method::GET, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["services"]["redis"].as_str().unwrap().starts_with("unhealthy"));
    }

    #[tokio::test]
    async fn scheduler_start_and_stop() {
        let f = fixture(vec![]);

        let (status, body) = call(&f.state, Method::POST, "/api/v1/scheduler/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Scheduler started successfully");
        assert!(f.state.scheduler.is_running());

        let (_, body) = call(&f.state, Method::POST, "/api/v1/scheduler/start").await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Scheduler already running");

        let (_, body) = call(&f.state, Method::GET, "/health").await;
        assert_eq!(body["services"]["scheduler"], "running");

        let (status, body) = call(&f.state, Method::POST, "/api/v1/scheduler/stop").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Scheduler stopped successfully");
        assert!(!f.state.scheduler.is_running());

        let (_, body) = call(&f.state, Method::POST, "/api/v1/scheduler/stop").await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Scheduler already stopped");
    }

    #[tokio::test]
    async fn sent_messages_are_paged_newest_first() {
        let f = fixture(vec![
            delivered(1, MessageStatus::Sent, 10),
            delivered(2, MessageStatus::Sent, 30),
            delivered(3, MessageStatus::Sent, 20),
            delivered(4, MessageStatus::Failed, 40),
            Message::pending(5, "+905550000005", "waiting"),
        ]);

        let (status, body) = call(&f.state, Method::GET, "/api/v1/messages/sent?limit=2").await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(body["data"][0]["status"], "sent");
        assert_eq!(body["data"][0]["phone_number"], "+905550000002");
        assert_eq!(body["pagination"]["limit"], 2);
        assert_eq!(body["pagination"]["offset"], 0);
        assert_eq!(body["pagination"]["count"], 2);
        assert_eq!(body["pagination"]["total"], 3);
        assert_eq!(body["pagination"]["has_more"], true);

        let (_, body) = call(&f.state, Method::GET, "/api/v1/messages/sent?limit=2&offset=2").await;
        assert_eq!(body["pagination"]["count"], 1);
        assert_eq!(body["pagination"]["has_more"], false);
    }

    #[tokio::test]
    async fn failed_messages_with_invalid_params_use_defaults() {
        let f = fixture(vec![
            delivered(1, MessageStatus::Failed, 5),
            delivered(2, MessageStatus::Sent, 6),
        ]);

        let (status, body) =
            call(&f.state, Method::GET, "/api/v1/messages/failed?limit=abc&offset=-3").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["limit"], 10);
        assert_eq!(body["pagination"]["offset"], 0);
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["data"][0]["id"], 1);
        assert_eq!(body["data"][0]["status"], "failed");
    }

    #[tokio::test]
    async fn store_error_maps_to_500() {
        let f = fixture(vec![]);
        f.store.fail_reads(true);

        let (status, body) = call(&f.state, Method::GET, "/api/v1/messages/sent").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["message"].is_string());
        assert!(body["time"].is_string());
    }
}
