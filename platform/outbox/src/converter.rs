//! Domain event → outbox row
//!
//! A converter turns one strongly typed domain event into exactly one
//! integration event; [`OutboxConverterHandler`] plugs a converter into the
//! dispatcher and appends the result to the outbox through the committing
//! session.

use crate::dispatcher::DomainEventHandler;
use crate::domain_event::DomainEvent;
use crate::error::{OutboxError, OutboxResult};
use crate::message::OutboxMessage;
use crate::repository::OutboxRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_bus::{validate_envelope_fields, EventEnvelope};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Broker-routable form of a domain event
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationEvent {
    pub id: Uuid,
    pub event_type: String,
    pub content: String,
    pub occurred_on: DateTime<Utc>,
}

impl IntegrationEvent {
    /// Envelope for `payload` stamped with `event`'s aggregate and `occurred_on`
    pub fn envelope_for<E, T>(source_module: &str, event: &E, payload: T) -> EventEnvelope<T>
    where
        E: DomainEvent + ?Sized,
    {
        EventEnvelope::new(
            source_module.to_string(),
            event.aggregate_type().to_string(),
            event.aggregate_id(),
            payload,
        )
        .with_occurred_at(event.occurred_on())
    }

    /// Serialize and validate an envelope
    ///
    /// The outbox row reuses the envelope's `event_id` so consumers and the
    /// outbox table agree on the message identity.
    pub fn from_envelope<T: Serialize>(
        event_type: &str,
        envelope: &EventEnvelope<T>,
    ) -> OutboxResult<Self> {
        let value = serde_json::to_value(envelope)?;
        validate_envelope_fields(&value).map_err(|e| OutboxError::conversion(event_type, e))?;

        Ok(Self {
            id: envelope.event_id,
            event_type: event_type.to_string(),
            content: serde_json::to_string(&value)?,
            occurred_on: envelope.occurred_at,
        })
    }

    pub fn into_outbox_message(self) -> OutboxMessage {
        OutboxMessage::with_id(self.id, self.event_type, self.content, self.occurred_on)
    }
}

/// Per-event-type adapter from a domain event to an integration event
#[async_trait]
pub trait IntegrationEventConverter<E: DomainEvent>: Send + Sync {
    async fn convert(&self, event: &E) -> OutboxResult<IntegrationEvent>;
}

/// Dispatcher handler that writes converted events to the outbox
pub struct OutboxConverterHandler<C, R> {
    converter: C,
    repository: Arc<R>,
}

impl<C, R> OutboxConverterHandler<C, R> {
    pub fn new(converter: C, repository: Arc<R>) -> Self {
        Self {
            converter,
            repository,
        }
    }
}

#[async_trait]
impl<E, C, R> DomainEventHandler<E, R::Session> for OutboxConverterHandler<C, R>
where
    E: DomainEvent,
    C: IntegrationEventConverter<E>,
    R: OutboxRepository,
{
    async fn handle(&self, event: &E, session: &mut R::Session) -> OutboxResult<()> {
        let integration_event = self.converter.convert(event).await.map_err(|e| {
            tracing::error!(
                event_type = %event.event_type(),
                aggregate_id = %event.aggregate_id(),
                error = %e,
                "Failed to convert domain event into an integration event"
            );
            e
        })?;

        self.repository
            .add(session, &integration_event.into_outbox_message())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DomainEventDispatcher;
    use crate::memory::{InMemorySession, InMemoryStore};
    use crate::store::TransactionalStore;
    use serde_json::json;

    #[derive(Debug)]
    struct Shipped {
        id: String,
        at: DateTime<Utc>,
    }

    impl DomainEvent for Shipped {
        fn event_type(&self) -> &'static str {
            "parcel.shipped"
        }
        fn aggregate_type(&self) -> &'static str {
            "parcel"
        }
        fn aggregate_id(&self) -> String {
            self.id.clone()
        }
        fn occurred_on(&self) -> DateTime<Utc> {
            self.at
        }
    }

    struct ShippedConverter;

    #[async_trait]
    impl IntegrationEventConverter<Shipped> for ShippedConverter {
        async fn convert(&self, event: &Shipped) -> OutboxResult<IntegrationEvent> {
            let envelope =
                IntegrationEvent::envelope_for("parcels", event, json!({ "parcel_id": event.id }));
            IntegrationEvent::from_envelope("parcels.parcel_shipped.v1", &envelope)
        }
    }

    struct BrokenConverter;

    #[async_trait]
    impl IntegrationEventConverter<Shipped> for BrokenConverter {
        async fn convert(&self, event: &Shipped) -> OutboxResult<IntegrationEvent> {
            Err(OutboxError::conversion(event.event_type(), "schema mismatch"))
        }
    }

    #[test]
    fn test_from_envelope_rejects_invalid_envelope() {
        let envelope = EventEnvelope::new(
            String::new(),
            "parcel".to_string(),
            "p1".to_string(),
            json!({}),
        );
        let err = IntegrationEvent::from_envelope("x", &envelope).unwrap_err();
        assert!(matches!(err, OutboxError::Conversion { .. }));
    }

    #[tokio::test]
    async fn test_converted_event_becomes_one_pending_row() {
        let store = Arc::new(InMemoryStore::new());
        let mut dispatcher = DomainEventDispatcher::<InMemorySession>::new();
        dispatcher.register::<Shipped, _>(OutboxConverterHandler::new(
            ShippedConverter,
            Arc::clone(&store),
        ));

        let at = Utc::now();
        let events: Vec<crate::SharedDomainEvent> = vec![Arc::new(Shipped {
            id: "p1".into(),
            at,
        })];

        let mut session = store.begin().await.unwrap();
        dispatcher.dispatch(&events, &mut session).await.unwrap();
        store.commit(session).await.unwrap();

        let rows = store.outbox_messages();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "parcels.parcel_shipped.v1");
        assert_eq!(rows[0].occurred_on, at);
        assert_eq!(rows[0].retry_count, 0);
        assert!(rows[0].processed_on.is_none());

        let content: serde_json::Value = serde_json::from_str(&rows[0].content).unwrap();
        assert_eq!(content["event_id"], rows[0].id.to_string());
        assert_eq!(content["aggregate_type"], "parcel");
        assert_eq!(content["aggregate_id"], "p1");
        assert_eq!(content["payload"]["parcel_id"], "p1");
    }

    #[tokio::test]
    async fn test_conversion_failure_propagates() {
        let store = Arc::new(InMemoryStore::new());
        let mut dispatcher = DomainEventDispatcher::<InMemorySession>::new();
        dispatcher.register::<Shipped, _>(OutboxConverterHandler::new(
            BrokenConverter,
            Arc::clone(&store),
        ));

        let events: Vec<crate::SharedDomainEvent> = vec![Arc::new(Shipped {
            id: "p1".into(),
            at: Utc::now(),
        })];

        let mut session = store.begin().await.unwrap();
        let err = dispatcher.dispatch(&events, &mut session).await.unwrap_err();

        assert!(matches!(err, OutboxError::Conversion { .. }));
        assert!(session.staged_outbox().is_empty());
    }
}
