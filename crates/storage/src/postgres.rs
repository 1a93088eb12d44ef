//! PostgreSQL-backed [`MessageStore`] over the `messages` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use herald_core::config::PostgresConfig;
use herald_core::{Message, MessageStatus};

use crate::error::StoreError;
use crate::store::MessageStore;

const MESSAGE_COLUMNS: &str = "id, phone_number, content, status, sent_at";

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    phone_number: String,
    content: String,
    status: String,
    sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            phone_number: row.phone_number,
            content: row.content,
            status: row.status.parse()?,
            sent_at: row.sent_at,
        })
    }
}

fn into_messages(rows: Vec<MessageRow>) -> Result<Vec<Message>, StoreError> {
    rows.into_iter().map(Message::try_from).collect()
}

/// Message store backed by a pooled PostgreSQL connection.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small pool against the configured database and verify it.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .max_lifetime(Duration::from_secs(10 * 60))
            .connect(&config.connection_string())
            .await?;
        info!("PostgreSQL connected: {}", config.host);
        Ok(Self { pool })
    }

    /// Apply the workspace migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Database migrations applied successfully");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn set_terminal_status(
        &self,
        id: i64,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE messages SET status = $1, sent_at = $2
             WHERE id = $3 AND status = $4",
        )
        .bind(status.as_str())
        .bind(at)
        .bind(id)
        .bind(MessageStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE status = $1
             ORDER BY id
             LIMIT $2"
        ))
        .bind(MessageStatus::Pending.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        into_messages(rows)
    }

    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_terminal_status(id, MessageStatus::Sent, at).await
    }

    async fn mark_failed(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_terminal_status(id, MessageStatus::Failed, at).await
    }

    async fn list_by_status(
        &self,
        status: MessageStatus,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE status = $1
             ORDER BY sent_at DESC NULLS LAST, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(status.as_str())
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        into_messages(rows)
    }

    async fn count_by_status(&self, status: MessageStatus) -> Result<u64, StoreError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> MessageRow {
        MessageRow {
            id: 7,
            phone_number: "+905551111111".to_string(),
            content: "hello".to_string(),
            status: status.to_string(),
            sent_at: None,
        }
    }

    #[test]
    fn row_converts_to_message() {
        let msg = Message::try_from(row("sent")).unwrap();
        assert_eq!(msg.id, 7);
        assert_eq!(msg.status, MessageStatus::Sent);
        assert_eq!(msg.phone_number, "+905551111111");
    }

    #[test]
    fn unknown_status_column_is_an_error() {
        let err = Message::try_from(row("archived")).unwrap_err();
        assert!(matches!(err, StoreError::Status(_)));
    }

    /// Requires a reachable PostgreSQL (`DATABASE_URL`); run with `-- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn pending_messages_transition_once() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();
        let store = PgMessageStore::new(pool);
        store.migrate().await.unwrap();

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (phone_number, content) VALUES ($1, $2) RETURNING id",
        )
        .bind("+905550000000")
        .bind("integration")
        .fetch_one(store.pool())
        .await
        .unwrap();

        let now = Utc::now();
        store.mark_sent(id, now).await.unwrap();
        store.mark_failed(id, now).await.unwrap();

        let status: String = sqlx::query_scalar("SELECT status FROM messages WHERE id = $1")
            .bind(id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(status, "sent");

        let pending = store.fetch_pending(100).await.unwrap();
        assert!(pending.iter().all(|m| m.id != id));
    }
}
