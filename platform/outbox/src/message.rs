use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Annotation prefixed to the error of a message that ran out of retries
pub const RETRIES_EXCEEDED: &str = "exceeded max retries";

/// One durable integration event
///
/// `processed_on` is the only "done" marker: it is set once, on the first
/// successful publish, and never cleared. `retry_count` only grows, except
/// through an explicit operator reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxMessage {
    pub id: Uuid,
    /// Integration event schema; consumers select their deserializer by it
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub event_type: String,
    /// Serialized payload, opaque to the outbox
    pub content: String,
    /// When the originating business fact happened
    pub occurred_on: DateTime<Utc>,
    pub processed_on: Option<DateTime<Utc>>,
    /// Last failure, overwritten on every failed attempt
    pub error: Option<String>,
    pub retry_count: i32,
}

impl OutboxMessage {
    /// A new pending message with a fresh id
    pub fn new(
        event_type: impl Into<String>,
        content: impl Into<String>,
        occurred_on: DateTime<Utc>,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), event_type, content, occurred_on)
    }

    pub fn with_id(
        id: Uuid,
        event_type: impl Into<String>,
        content: impl Into<String>,
        occurred_on: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_type: event_type.into(),
            content: content.into(),
            occurred_on,
            processed_on: None,
            error: None,
            retry_count: 0,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_on.is_some()
    }

    /// Ran out of retries without ever being published
    pub fn is_exhausted(&self, max_retries: i32) -> bool {
        !self.is_processed() && self.retry_count >= max_retries
    }

    pub fn to_pending(&self) -> PendingOutboxMessage {
        PendingOutboxMessage {
            id: self.id,
            event_type: self.event_type.clone(),
            content: self.content.clone(),
            retry_count: self.retry_count,
        }
    }
}

/// Projection handed to the processor for one publish attempt
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingOutboxMessage {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    pub event_type: String,
    pub content: String,
    pub retry_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_is_pending() {
        let msg = OutboxMessage::new("orders.order_placed.v1", "{}", Utc::now());

        assert!(!msg.is_processed());
        assert_eq!(msg.retry_count, 0);
        assert!(msg.error.is_none());
    }

    #[test]
    fn test_exhaustion_depends_on_ceiling_and_processing() {
        let mut msg = OutboxMessage::new("t", "{}", Utc::now());
        msg.retry_count = 3;

        assert!(msg.is_exhausted(3));
        assert!(!msg.is_exhausted(4));

        msg.processed_on = Some(Utc::now());
        assert!(!msg.is_exhausted(3));
    }

    #[test]
    fn test_serializes_type_field() {
        let msg = OutboxMessage::new("orders.order_placed.v1", "{}", Utc::now());
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "orders.order_placed.v1");
    }
}
