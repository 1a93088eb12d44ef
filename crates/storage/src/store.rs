//! Durable message store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use herald_core::{Message, MessageStatus};

use crate::error::StoreError;

/// Durable store holding messages and their lifecycle status.
///
/// Implementations must be safe for concurrent independent calls. The
/// fetch-by-status query is the only de-duplication mechanism the scheduler
/// relies on, so a message must only be returned while it is pending.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Up to `limit` messages currently pending, in store-chosen order.
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<Message>, StoreError>;

    /// Move a pending message to `sent`, stamping `at`.
    ///
    /// Calling this for a message that already left `pending` is a no-op.
    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Move a pending message to `failed`, stamping `at`.
    async fn mark_failed(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Page through messages with `status`, most recently stamped first.
    async fn list_by_status(
        &self,
        status: MessageStatus,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, StoreError>;

    /// Number of messages with `status`.
    async fn count_by_status(&self, status: MessageStatus) -> Result<u64, StoreError>;

    /// Check connectivity.
    async fn ping(&self) -> Result<(), StoreError>;
}
