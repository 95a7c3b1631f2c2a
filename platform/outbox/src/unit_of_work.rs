//! Unit of work: the single commit path for business writes
//!
//! A commit runs, in this order and without hooks for callers:
//!
//! 1. stamp audit fields on added / modified entities
//! 2. harvest pending domain events from aggregate roots and clear them
//! 3. persist every tracked entity through one storage session
//! 4. dispatch the harvested events through the same session
//! 5. commit the session
//!
//! Events are only dispatched once every write succeeded, and since the
//! outbox rows written by dispatch handlers share the session, they become
//! durable together with the business write or not at all.

use crate::audit::{AuditInfo, CurrentUser};
use crate::dispatcher::DomainEventDispatcher;
use crate::domain_event::{AggregateRoot, SharedDomainEvent};
use crate::error::OutboxResult;
use crate::store::TransactionalStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Added,
    Modified,
}

/// An entity whose changes a [`UnitOfWork`] writes
#[async_trait]
pub trait TrackedEntity<S: Send>: Send + Sync {
    fn audit_mut(&mut self) -> &mut AuditInfo;

    /// Aggregate roots expose their pending events here
    fn as_aggregate_root(&mut self) -> Option<&mut dyn AggregateRoot> {
        None
    }

    /// Write the entity through `session`, returning the number of rows written
    async fn persist(&self, session: &mut S, state: EntityState) -> OutboxResult<u64>;
}

/// Entities changed by one business operation, in tracking order
pub struct ChangeTracker<'a, S: Send> {
    entries: Vec<(EntityState, &'a mut (dyn TrackedEntity<S> + 'a))>,
}

impl<S: Send> Default for ChangeTracker<'_, S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<'a, S: Send> ChangeTracker<'a, S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: &'a mut (dyn TrackedEntity<S> + 'a)) -> &mut Self {
        self.entries.push((EntityState::Added, entity));
        self
    }

    pub fn modify(&mut self, entity: &'a mut (dyn TrackedEntity<S> + 'a)) -> &mut Self {
        self.entries.push((EntityState::Modified, entity));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct UnitOfWork<St: TransactionalStore> {
    store: Arc<St>,
    dispatcher: Arc<DomainEventDispatcher<St::Session>>,
    current_user: Arc<dyn CurrentUser>,
}

impl<St: TransactionalStore> Clone for UnitOfWork<St> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            dispatcher: Arc::clone(&self.dispatcher),
            current_user: Arc::clone(&self.current_user),
        }
    }
}

impl<St> UnitOfWork<St>
where
    St: TransactionalStore,
    St::Session: 'static,
{
    pub fn new(
        store: Arc<St>,
        dispatcher: Arc<DomainEventDispatcher<St::Session>>,
        current_user: Arc<dyn CurrentUser>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            current_user,
        }
    }

    /// Same store and dispatcher, acting on behalf of another user
    pub fn for_user(&self, current_user: Arc<dyn CurrentUser>) -> Self {
        Self {
            current_user,
            ..self.clone()
        }
    }

    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    /// Persist every tracked change and dispatch the raised domain events
    ///
    /// Returns the number of rows written by the tracked entities. On a
    /// failed write nothing is dispatched and the harvested events are lost
    /// along with the write; the aggregates do not get them back.
    pub async fn commit(&self, mut tracker: ChangeTracker<'_, St::Session>) -> OutboxResult<u64> {
        self.stamp_audit_fields(&mut tracker);
        let events = Self::harvest_domain_events(&mut tracker);

        let mut session = self.store.begin().await?;

        let mut written = 0;
        for (state, entity) in tracker.entries.iter() {
            match entity.persist(&mut session, *state).await {
                Ok(rows) => written += rows,
                Err(e) => {
                    tracing::warn!(
                        discarded_events = events.len(),
                        error = %e,
                        "Write failed, harvested domain events discarded without dispatch"
                    );
                    return Err(e);
                }
            }
        }

        self.dispatcher.dispatch(&events, &mut session).await?;

        self.store.commit(session).await?;

        tracing::debug!(
            rows = written,
            dispatched_events = events.len(),
            "Unit of work committed"
        );

        Ok(written)
    }

    fn stamp_audit_fields(&self, tracker: &mut ChangeTracker<'_, St::Session>) {
        let user = self.current_user.username();
        let now = Utc::now();

        for (state, entity) in tracker.entries.iter_mut() {
            match state {
                EntityState::Added => entity.audit_mut().stamp_created(&user, now),
                EntityState::Modified => entity.audit_mut().stamp_modified(&user, now),
            }
        }
    }

    fn harvest_domain_events(tracker: &mut ChangeTracker<'_, St::Session>) -> Vec<SharedDomainEvent> {
        let mut events = Vec::new();

        for (_, entity) in tracker.entries.iter_mut() {
            if let Some(root) = entity.as_aggregate_root() {
                events.extend(root.domain_events().iter().cloned());
                root.clear_domain_events();
            }
        }

        events
    }
}
