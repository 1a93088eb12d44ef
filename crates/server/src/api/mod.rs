//! HTTP control API endpoint modules.
//!
//! Shared response types live here in mod.rs.

pub mod doc;
mod health;
mod messages;
mod scheduler;

use axum::http::StatusCode;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

// ── Shared types ─────────────────────────────────────────────────

/// Body of every 5xx response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Always `"error"`.
    #[schema(value_type = String)]
    pub status: &'static str,
    pub message: String,
    pub time: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn internal_error() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            status: "error",
            message: "Internal server error".to_string(),
            time: now_rfc3339(),
        }),
    )
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ── Re-exports ───────────────────────────────────────────────────

pub use health::health;
pub use messages::{failed_messages, sent_messages};
pub use scheduler::{scheduler_start, scheduler_stop};
