//! Transactional outbox
//!
//! Business writes go through a [`UnitOfWork`], which harvests the domain
//! events raised by aggregates and dispatches them inside the committing
//! session. Converters registered with the [`DomainEventDispatcher`] turn
//! those events into [`OutboxMessage`] rows, and the [`OutboxProcessor`]
//! later publishes the rows to the event bus with bounded retries.
//!
//! ```text
//! commit:   stamp audit -> harvest events -> persist -> dispatch -> COMMIT
//! dispatch:                                  event -> converter -> outbox row
//! background:        outbox rows -> publish -> mark processed / failed
//! ```

pub mod audit;
pub mod config;
pub mod converter;
pub mod dispatcher;
pub mod domain_event;
pub mod error;
pub mod memory;
pub mod message;
pub mod postgres;
pub mod processor;
pub mod repository;
pub mod store;
pub mod unit_of_work;

pub use audit::{AuditInfo, CurrentUser, SystemUser};
pub use config::OutboxProcessorConfig;
pub use converter::{IntegrationEvent, IntegrationEventConverter, OutboxConverterHandler};
pub use dispatcher::{DomainEventDispatcher, DomainEventHandler};
pub use domain_event::{AggregateRoot, DomainEvent, DomainEvents, SharedDomainEvent};
pub use error::{OutboxError, OutboxResult};
pub use memory::{InMemorySession, InMemoryStore};
pub use message::{OutboxMessage, PendingOutboxMessage, RETRIES_EXCEEDED};
pub use postgres::{PgSession, PgStore};
pub use processor::{BatchReport, OutboxProcessor};
pub use repository::OutboxRepository;
pub use store::TransactionalStore;
pub use unit_of_work::{ChangeTracker, EntityState, TrackedEntity, UnitOfWork};
