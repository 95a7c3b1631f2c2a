//! Domain events and the aggregate capability that carries them
//!
//! Domain events are in-process facts. An aggregate records them while a
//! business operation runs; the unit of work harvests them once per
//! successful commit and hands them to the dispatcher.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Gives every `'static` type a `&dyn Any` view for handler lookup
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A fact raised by an aggregate during a business operation
pub trait DomainEvent: AsAny + Send + Sync + fmt::Debug {
    /// Stable event tag, e.g. `"order.placed"`
    fn event_type(&self) -> &'static str;

    fn aggregate_type(&self) -> &'static str;

    fn aggregate_id(&self) -> String;

    fn occurred_on(&self) -> DateTime<Utc>;
}

impl dyn DomainEvent {
    /// Downcast to the concrete event type
    pub fn downcast_ref<E: DomainEvent>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}

/// Shared handle to a harvested event
pub type SharedDomainEvent = Arc<dyn DomainEvent>;

/// Opt-in capability for aggregates that raise domain events
///
/// The unit of work only harvests from tracked entities that expose this
/// capability.
pub trait AggregateRoot: Send + Sync {
    /// Events raised since the last commit, in the order they were raised
    fn domain_events(&self) -> &[SharedDomainEvent];

    fn clear_domain_events(&mut self);
}

/// Pending-event list an aggregate embeds
#[derive(Debug, Default, Clone)]
pub struct DomainEvents(Vec<SharedDomainEvent>);

impl DomainEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise<E: DomainEvent>(&mut self, event: E) {
        self.0.push(Arc::new(event));
    }

    pub fn as_slice(&self) -> &[SharedDomainEvent] {
        &self.0
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
