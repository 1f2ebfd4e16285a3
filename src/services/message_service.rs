use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::inbound_message::{DeliveryStatus, InboundMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Processed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

/// Append-only log of inbound messages, keyed by provider message id.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Logs `message` and claims it for processing at `now`. Returns `false`
    /// when the id was seen before and must not be processed again.
    ///
    /// An id is handed out once more when its earlier processing failed, or
    /// when it is still `received` from a claim made before `reclaim_before`
    /// (the attempt was cancelled or the process died).
    async fn record(
        &self,
        message: &InboundMessage,
        to_number: &str,
        now: DateTime<Utc>,
        reclaim_before: DateTime<Utc>,
    ) -> Result<bool>;
    async fn finish(&self, message_id: &str, status: ProcessingStatus) -> Result<()>;
    /// Stores a delivery receipt without touching the processing status.
    /// Returns whether a logged message matched.
    async fn apply_delivery_status(&self, status: &DeliveryStatus) -> Result<bool>;
}

#[derive(Clone)]
pub struct MessageService {
    pool: PgPool,
}

impl MessageService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageLog for MessageService {
    async fn record(
        &self,
        message: &InboundMessage,
        to_number: &str,
        now: DateTime<Utc>,
        reclaim_before: DateTime<Utc>,
    ) -> Result<bool> {
        let media_url = message.media.as_ref().map(|m| m.as_str().to_string());
        let row: Option<(uuid::Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO inbound_messages
                (message_id, from_number, to_number, message_type, message_body, media_url, media_content_type, received_at, claimed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (message_id) DO UPDATE
                SET status = 'received', claimed_at = EXCLUDED.claimed_at, processed_at = NULL
                WHERE inbound_messages.status = 'failed'
                   OR (inbound_messages.status = 'received' AND inbound_messages.claimed_at < $10)
            RETURNING id
            "#,
        )
        .bind(&message.message_id)
        .bind(&message.sender)
        .bind(to_number)
        .bind(message.kind.as_str())
        .bind(message.log_body())
        .bind(media_url)
        .bind(&message.media_content_type)
        .bind(message.timestamp)
        .bind(now)
        .bind(reclaim_before)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn finish(&self, message_id: &str, status: ProcessingStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE inbound_messages
            SET status = $2, processed_at = NOW()
            WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_delivery_status(&self, status: &DeliveryStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE inbound_messages
            SET delivery_status = $2, delivery_updated_at = NOW()
            WHERE message_id = $1
            "#,
        )
        .bind(&status.message_id)
        .bind(&status.status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
