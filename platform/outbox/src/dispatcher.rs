//! In-process, sequential fan-out of harvested domain events
//!
//! Handlers are registered per concrete event type. Dispatch walks the batch
//! in order and awaits every handler before moving on, because a later
//! handler may depend on the durable side effect of an earlier one. The
//! first failing handler stops the batch.

use crate::domain_event::{DomainEvent, SharedDomainEvent};
use crate::error::OutboxResult;
use async_trait::async_trait;
use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Handles one concrete domain event type within the committing session
#[async_trait]
pub trait DomainEventHandler<E: DomainEvent, S: Send>: Send + Sync {
    async fn handle(&self, event: &E, session: &mut S) -> OutboxResult<()>;
}

#[async_trait]
trait ErasedHandler<S: Send>: Send + Sync {
    async fn handle(&self, event: &dyn DomainEvent, session: &mut S) -> OutboxResult<()>;
}

struct Typed<E, H> {
    handler: H,
    _event: PhantomData<fn(&E)>,
}

#[async_trait]
impl<E, H, S> ErasedHandler<S> for Typed<E, H>
where
    E: DomainEvent,
    H: DomainEventHandler<E, S>,
    S: Send,
{
    async fn handle(&self, event: &dyn DomainEvent, session: &mut S) -> OutboxResult<()> {
        match event.downcast_ref::<E>() {
            Some(event) => self.handler.handle(event, session).await,
            None => Ok(()),
        }
    }
}

/// Registry of handlers keyed by event type
pub struct DomainEventDispatcher<S: Send> {
    handlers: HashMap<TypeId, Vec<Arc<dyn ErasedHandler<S>>>>,
}

impl<S: Send + 'static> Default for DomainEventDispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + 'static> DomainEventDispatcher<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for events of type `E`
    ///
    /// Handlers for the same type run in registration order.
    pub fn register<E, H>(&mut self, handler: H) -> &mut Self
    where
        E: DomainEvent,
        H: DomainEventHandler<E, S> + 'static,
    {
        self.handlers
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Arc::new(Typed {
                handler,
                _event: PhantomData,
            }));
        self
    }

    /// Number of handlers registered for `E`
    pub fn handler_count<E: DomainEvent>(&self) -> usize {
        self.handlers.get(&TypeId::of::<E>()).map_or(0, Vec::len)
    }

    /// Dispatch every event, in order, to the handlers of its concrete type
    pub async fn dispatch(&self, events: &[SharedDomainEvent], session: &mut S) -> OutboxResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        for event in events {
            let event: &dyn DomainEvent = &**event;
            let Some(handlers) = self.handlers.get(&event.as_any().type_id()) else {
                tracing::trace!(event_type = %event.event_type(), "No handlers registered");
                continue;
            };

            for handler in handlers {
                handler.handle(event, session).await.map_err(|e| {
                    tracing::error!(
                        event_type = %event.event_type(),
                        aggregate_type = %event.aggregate_type(),
                        aggregate_id = %event.aggregate_id(),
                        error = %e,
                        "Domain event handler failed, remaining events not dispatched"
                    );
                    e
                })?;
            }
        }

        Ok(())
    }
}
