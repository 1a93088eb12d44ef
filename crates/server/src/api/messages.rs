//! Paged listings of delivered and failed messages.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use herald_core::{Message, MessageStatus};

use crate::state::AppState;

use super::{internal_error, ApiError, ErrorResponse};

const DEFAULT_LIMIT: u32 = 10;

/// Raw query parameters; anything unparseable falls back to the defaults.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Page size (default 10).
    pub limit: Option<String>,
    /// Rows to skip (default 0).
    pub offset: Option<String>,
}

impl PageParams {
    fn limit(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_LIMIT)
    }

    fn offset(&self) -> u32 {
        self.offset
            .as_deref()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub count: usize,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MessagePage {
    /// Messages ordered by `sent_at` descending.
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Message>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "/api/v1/messages/sent",
    tag = "Messages",
    params(PageParams),
    responses(
        (status = 200, description = "Page of sent messages", body = MessagePage),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    )
)]
pub async fn sent_messages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<MessagePage>, ApiError> {
    page(&state, MessageStatus::Sent, &params).await
}

#[utoipa::path(
    get,
    path = "/api/v1/messages/failed",
    tag = "Messages",
    params(PageParams),
    responses(
        (status = 200, description = "Page of failed messages", body = MessagePage),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    )
)]
pub async fn failed_messages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<MessagePage>, ApiError> {
    page(&state, MessageStatus::Failed, &params).await
}

async fn page(
    state: &AppState,
    status: MessageStatus,
    params: &PageParams,
) -> Result<Json<MessagePage>, ApiError> {
    let limit = params.limit();
    let offset = params.offset();

    let data = state
        .store
        .list_by_status(status, limit, offset)
        .await
        .map_err(|e| {
            warn!(%status, error = %e, "failed to list messages");
            internal_error()
        })?;

    let total = state.store.count_by_status(status).await.map_err(|e| {
        warn!(%status, error = %e, "failed to count messages");
        internal_error()
    })?;

    Ok(Json(MessagePage {
        pagination: Pagination {
            limit,
            offset,
            count: data.len(),
            total,
            has_more: u64::from(offset) + u64::from(limit) < total,
        },
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(limit: Option<&str>, offset: Option<&str>) -> PageParams {
        PageParams {
            limit: limit.map(str::to_string),
            offset: offset.map(str::to_string),
        }
    }

    #[test]
    fn defaults_when_absent() {
        let p = PageParams::default();
        assert_eq!((p.limit(), p.offset()), (10, 0));
    }

    #[test]
    fn invalid_values_fall_back() {
        for (limit, offset) in [("abc", "xyz"), ("0", "-1"), ("-5", "1.5")] {
            let p = params(Some(limit), Some(offset));
            assert_eq!((p.limit(), p.offset()), (10, 0), "limit={limit} offset={offset}");
        }
    }

    #[test]
    fn valid_values_are_used() {
        let p = params(Some("25"), Some("50"));
        assert_eq!((p.limit(), p.offset()), (25, 50));
    }
}
