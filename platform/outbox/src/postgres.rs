//! Postgres-backed store and outbox repository
//!
//! Uses the transactional outbox pattern: `add` inserts through the same
//! transaction as the domain changes, the processor's operations run as
//! single statements on the pool.

use crate::error::{OutboxError, OutboxResult};
use crate::message::{OutboxMessage, PendingOutboxMessage};
use crate::repository::OutboxRepository;
use crate::store::TransactionalStore;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Session type for Postgres-backed units of work
pub type PgSession = Transaction<'static, Postgres>;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the outbox table migrations
    ///
    /// Other migration sets may share the database, so versions unknown to
    /// this crate are ignored.
    pub async fn run_migrations(&self) -> OutboxResult<()> {
        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await?;
        Ok(())
    }

    async fn ensure_exists(&self, id: Uuid) -> OutboxResult<()> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM outbox_messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        exists.map(|_| ()).ok_or(OutboxError::NotFound(id))
    }
}

#[async_trait]
impl TransactionalStore for PgStore {
    type Session = PgSession;

    async fn begin(&self) -> OutboxResult<PgSession> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, session: PgSession) -> OutboxResult<()> {
        session.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for PgStore {
    type Session = PgSession;

    async fn add(&self, session: &mut PgSession, message: &OutboxMessage) -> OutboxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_messages
                (id, type, content, occurred_on, processed_on, error, retry_count)
            VALUES ($1, $2, $3, $4, NULL, NULL, 0)
            "#,
        )
        .bind(message.id)
        .bind(&message.event_type)
        .bind(&message.content)
        .bind(message.occurred_on)
        .execute(&mut **session)
        .await?;

        tracing::debug!(
            message_id = %message.id,
            event_type = %message.event_type,
            "Integration event enqueued to outbox"
        );

        Ok(())
    }

    async fn get_unprocessed(&self, batch_size: i64) -> OutboxResult<Vec<PendingOutboxMessage>> {
        let rows = sqlx::query_as::<_, PendingOutboxMessage>(
            r#"
            SELECT id, type, content, retry_count
            FROM outbox_messages
            WHERE processed_on IS NULL
            ORDER BY occurred_on ASC
            LIMIT $1
            "#,
        )
        .bind(batch_size.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get_retryable(
        &self,
        batch_size: i64,
        max_retries: i32,
    ) -> OutboxResult<Vec<PendingOutboxMessage>> {
        let rows = sqlx::query_as::<_, PendingOutboxMessage>(
            r#"
            SELECT id, type, content, retry_count
            FROM outbox_messages
            WHERE processed_on IS NULL
              AND retry_count < $2
            ORDER BY occurred_on ASC
            LIMIT $1
            "#,
        )
        .bind(batch_size.max(0))
        .bind(max_retries)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get_exhausted(&self, limit: i64, max_retries: i32) -> OutboxResult<Vec<OutboxMessage>> {
        let rows = sqlx::query_as::<_, OutboxMessage>(
            r#"
            SELECT id, type, content, occurred_on, processed_on, error, retry_count
            FROM outbox_messages
            WHERE processed_on IS NULL
              AND retry_count >= $2
            ORDER BY occurred_on ASC
            LIMIT $1
            "#,
        )
        .bind(limit.max(0))
        .bind(max_retries)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn mark_as_processed(&self, id: Uuid) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET processed_on = NOW()
            WHERE id = $1 AND processed_on IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Already processed is fine; a missing row is not
            self.ensure_exists(id).await?;
        }

        tracing::debug!(message_id = %id, "Marked outbox message as processed");

        Ok(())
    }

    async fn mark_as_failed(&self, id: Uuid, error: &str, retry_count: i32) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET error = $2,
                retry_count = GREATEST(retry_count, $3)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(retry_count)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::NotFound(id));
        }

        Ok(())
    }

    async fn reset_retries(&self, id: Uuid) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET retry_count = 0,
                error = NULL
            WHERE id = $1 AND processed_on IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::NotFound(id));
        }

        tracing::info!(message_id = %id, "Outbox message reset for replay");

        Ok(())
    }
}
