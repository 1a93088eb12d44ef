//! Liveness of the service and its collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

use super::now_rfc3339;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `"healthy"` or `"unhealthy"`.
    #[schema(value_type = String)]
    pub status: &'static str,
    pub timestamp: String,
    /// `database`, `redis` and `scheduler` keyed states.
    #[schema(value_type = Object)]
    pub services: BTreeMap<&'static str, String>,
}

/// 200 when the store answers a ping, 503 otherwise. The cache is reported
/// but does not affect the status code.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let mut services = BTreeMap::new();

    let database = match tokio::time::timeout(PING_TIMEOUT, state.store.ping()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("ping timed out".to_string()),
    };
    let healthy = database.is_ok();
    services.insert("database", describe(database));

    let cache = match tokio::time::timeout(PING_TIMEOUT, state.cache.ping()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("ping timed out".to_string()),
    };
    services.insert("redis", describe(cache));

    let scheduler = if state.scheduler.is_running() { "running" } else { "stopped" };
    services.insert("scheduler", scheduler.to_string());

    let (code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        code,
        Json(HealthResponse {
            status,
            timestamp: now_rfc3339(),
            services,
        }),
    )
}

fn describe(result: Result<(), String>) -> String {
    match result {
        Ok(()) => "healthy".to_string(),
        Err(e) => format!("unhealthy: {e}"),
    }
}
