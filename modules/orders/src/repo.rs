//! Order persistence for both store backends
//!
//! Writes go through the unit of work (`TrackedEntity`), reads through
//! [`OrderReader`].

use crate::domain::{Order, OrderStatus};
use crate::error::OrderError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbox::{
    AuditInfo, EntityState, InMemorySession, InMemoryStore, OutboxError, OutboxResult, PgSession,
    PgStore, TrackedEntity,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TABLE: &str = "orders";

/// Row shape shared by Postgres and the in-memory store
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: Uuid,
    pub customer_id: String,
    pub total_cents: i64,
    pub status: String,
    pub cancel_reason: Option<String>,
    pub created_by: Option<String>,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub modified_on: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderRecord {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            customer_id: order.customer_id.clone(),
            total_cents: order.total_cents,
            status: order.status.as_str().to_string(),
            cancel_reason: order.cancel_reason.clone(),
            created_by: order.audit.created_by.clone(),
            created_on: order.audit.created_on,
            modified_by: order.audit.modified_by.clone(),
            modified_on: order.audit.modified_on,
        }
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = OrderError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let status: OrderStatus = record.status.parse().map_err(|reason| OrderError::CorruptRecord {
            id: record.id.to_string(),
            reason,
        })?;

        Ok(Order::restore(
            record.id,
            record.customer_id,
            record.total_cents,
            status,
            record.cancel_reason,
            AuditInfo {
                created_by: record.created_by,
                created_on: record.created_on,
                modified_by: record.modified_by,
                modified_on: record.modified_on,
            },
        ))
    }
}

/// Loads orders outside any unit of work
#[async_trait]
pub trait OrderReader: Send + Sync {
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, OrderError>;
}

// ============================================================================
// Postgres
// ============================================================================

#[async_trait]
impl TrackedEntity<PgSession> for Order {
    fn audit_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit
    }

    fn as_aggregate_root(&mut self) -> Option<&mut dyn outbox::AggregateRoot> {
        Some(self)
    }

    async fn persist(&self, session: &mut PgSession, state: EntityState) -> OutboxResult<u64> {
        let record = OrderRecord::from(self);

        let result = match state {
            EntityState::Added => {
                sqlx::query(
                    r#"
                    INSERT INTO orders
                        (id, customer_id, total_cents, status, cancel_reason,
                         created_by, created_on, modified_by, modified_on)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(record.id)
                .bind(&record.customer_id)
                .bind(record.total_cents)
                .bind(&record.status)
                .bind(&record.cancel_reason)
                .bind(&record.created_by)
                .bind(record.created_on)
                .bind(&record.modified_by)
                .bind(record.modified_on)
                .execute(&mut **session)
                .await?
            }
            EntityState::Modified => {
                sqlx::query(
                    r#"
                    UPDATE orders
                    SET status = $2,
                        cancel_reason = $3,
                        modified_by = $4,
                        modified_on = $5
                    WHERE id = $1
                    "#,
                )
                .bind(record.id)
                .bind(&record.status)
                .bind(&record.cancel_reason)
                .bind(&record.modified_by)
                .bind(record.modified_on)
                .execute(&mut **session)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(OutboxError::Store(format!("order {} does not exist", self.id)));
        }

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderReader for PgStore {
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        let record = sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT id, customer_id, total_cents, status, cancel_reason,
                   created_by, created_on, modified_by, modified_on
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        record.map(Order::try_from).transpose()
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[async_trait]
impl TrackedEntity<InMemorySession> for Order {
    fn audit_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit
    }

    fn as_aggregate_root(&mut self) -> Option<&mut dyn outbox::AggregateRoot> {
        Some(self)
    }

    async fn persist(&self, session: &mut InMemorySession, _state: EntityState) -> OutboxResult<u64> {
        let row = serde_json::to_value(OrderRecord::from(self))?;
        session.put_row(TABLE, self.id.to_string(), row);
        Ok(1)
    }
}

#[async_trait]
impl OrderReader for InMemoryStore {
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        let Some(row) = self.row(TABLE, &id.to_string()) else {
            return Ok(None);
        };

        let record: OrderRecord =
            serde_json::from_value(row).map_err(|e| OrderError::CorruptRecord {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        Order::try_from(record).map(Some)
    }
}
