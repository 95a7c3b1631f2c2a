//! Integration events published by the orders module
//!
//! Each domain event maps to one versioned integration event wrapped in the
//! platform envelope. Consumers select their deserializer by event type.

use crate::domain::{OrderCancelled, OrderPlaced};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_bus::EventEnvelope;
use outbox::{
    DomainEvent, DomainEventDispatcher, IntegrationEvent, IntegrationEventConverter,
    OutboxConverterHandler, OutboxRepository, OutboxResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const SOURCE_MODULE: &str = "orders";
pub const EVENT_TYPE_ORDER_PLACED: &str = "orders.order_placed.v1";
pub const EVENT_TYPE_ORDER_CANCELLED: &str = "orders.order_cancelled.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedPayload {
    pub order_id: Uuid,
    pub customer_id: String,
    pub total_cents: i64,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledPayload {
    pub order_id: Uuid,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

fn envelope<E: DomainEvent, T>(event: &E, payload: T) -> EventEnvelope<T> {
    IntegrationEvent::envelope_for(SOURCE_MODULE, event, payload)
        .with_source_version(env!("CARGO_PKG_VERSION").to_string())
}

pub struct OrderPlacedConverter;

#[async_trait]
impl IntegrationEventConverter<OrderPlaced> for OrderPlacedConverter {
    async fn convert(&self, event: &OrderPlaced) -> OutboxResult<IntegrationEvent> {
        let payload = OrderPlacedPayload {
            order_id: event.order_id,
            customer_id: event.customer_id.clone(),
            total_cents: event.total_cents,
            placed_at: event.occurred_on(),
        };
        IntegrationEvent::from_envelope(EVENT_TYPE_ORDER_PLACED, &envelope(event, payload))
    }
}

pub struct OrderCancelledConverter;

#[async_trait]
impl IntegrationEventConverter<OrderCancelled> for OrderCancelledConverter {
    async fn convert(&self, event: &OrderCancelled) -> OutboxResult<IntegrationEvent> {
        let payload = OrderCancelledPayload {
            order_id: event.order_id,
            reason: event.reason.clone(),
            cancelled_at: event.occurred_on(),
        };
        IntegrationEvent::from_envelope(EVENT_TYPE_ORDER_CANCELLED, &envelope(event, payload))
    }
}

/// Dispatcher that writes every order event to `outbox`
pub fn outbox_dispatcher<R>(outbox: Arc<R>) -> DomainEventDispatcher<R::Session>
where
    R: OutboxRepository + 'static,
    R::Session: 'static,
{
    let mut dispatcher = DomainEventDispatcher::new();
    dispatcher
        .register::<OrderPlaced, _>(OutboxConverterHandler::new(
            OrderPlacedConverter,
            Arc::clone(&outbox),
        ))
        .register::<OrderCancelled, _>(OutboxConverterHandler::new(OrderCancelledConverter, outbox));
    dispatcher
}
