//! Start/stop control of the delivery scheduler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

use super::now_rfc3339;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SchedulerActionResponse {
    #[schema(value_type = String)]
    pub status: &'static str,
    #[schema(value_type = String)]
    pub message: &'static str,
    pub time: String,
}

fn success(message: &'static str) -> Json<SchedulerActionResponse> {
    Json(SchedulerActionResponse {
        status: "success",
        message,
        time: now_rfc3339(),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/scheduler/start",
    tag = "Scheduler",
    responses(
        (status = 200, description = "Scheduler running", body = SchedulerActionResponse)
    )
)]
pub async fn scheduler_start(State(state): State<Arc<AppState>>) -> Json<SchedulerActionResponse> {
    if state.scheduler.start() {
        info!("scheduler started via API");
        success("Scheduler started successfully")
    } else {
        success("Scheduler already running")
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/scheduler/stop",
    tag = "Scheduler",
    responses(
        (status = 200, description = "Scheduler stopped", body = SchedulerActionResponse)
    )
)]
pub async fn scheduler_stop(State(state): State<Arc<AppState>>) -> Json<SchedulerActionResponse> {
    if state.scheduler.stop() {
        info!("scheduler stopped via API");
        success("Scheduler stopped successfully")
    } else {
        success("Scheduler already stopped")
    }
}
