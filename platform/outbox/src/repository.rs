use crate::error::OutboxResult;
use crate::message::{OutboxMessage, PendingOutboxMessage};
use async_trait::async_trait;
use uuid::Uuid;

/// Operations over the outbox table
///
/// `add` writes through the caller's session so the row shares the business
/// write's commit or rollback. Everything else is used by the processor and
/// runs on its own.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    type Session: Send;

    /// Insert a pending message (no `processed_on`, `retry_count = 0`)
    async fn add(&self, session: &mut Self::Session, message: &OutboxMessage) -> OutboxResult<()>;

    /// Up to `batch_size` rows with `processed_on IS NULL`, oldest `occurred_on` first.
    /// A non-positive `batch_size` selects nothing.
    async fn get_unprocessed(&self, batch_size: i64) -> OutboxResult<Vec<PendingOutboxMessage>>;

    /// Like `get_unprocessed`, but skips rows with `retry_count >= max_retries`
    async fn get_retryable(
        &self,
        batch_size: i64,
        max_retries: i32,
    ) -> OutboxResult<Vec<PendingOutboxMessage>>;

    /// Unprocessed rows that ran out of retries, oldest first
    async fn get_exhausted(&self, limit: i64, max_retries: i32) -> OutboxResult<Vec<OutboxMessage>>;

    /// Set `processed_on` to now; a second call keeps the first timestamp
    async fn mark_as_processed(&self, id: Uuid) -> OutboxResult<()>;

    /// Record a failed attempt without touching `processed_on`
    async fn mark_as_failed(&self, id: Uuid, error: &str, retry_count: i32) -> OutboxResult<()>;

    /// Put an exhausted message back into rotation (manual replay)
    async fn reset_retries(&self, id: Uuid) -> OutboxResult<()>;
}
