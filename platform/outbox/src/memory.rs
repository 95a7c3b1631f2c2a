//! In-memory store for tests and local development
//!
//! Writes made through an [`InMemorySession`] are staged and only become
//! visible when the session is committed, so rollback behaviour matches the
//! Postgres backend.

use crate::error::{OutboxError, OutboxResult};
use crate::message::{OutboxMessage, PendingOutboxMessage};
use crate::repository::OutboxRepository;
use crate::store::TransactionalStore;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    rows: BTreeMap<(String, String), Value>,
    outbox: Vec<OutboxMessage>,
    fail_next_commit: bool,
    fail_next_fetch: bool,
    commits: usize,
}

/// Staged writes of one unit of work
#[derive(Debug, Default)]
pub struct InMemorySession {
    rows: Vec<(String, String, Value)>,
    outbox: Vec<OutboxMessage>,
}

impl InMemorySession {
    /// Stage an insert-or-replace of one row
    pub fn put_row(&mut self, table: &str, key: impl Into<String>, value: Value) {
        self.rows.push((table.to_string(), key.into(), value));
    }

    /// Outbox messages staged so far, in insertion order
    pub fn staged_outbox(&self) -> &[OutboxMessage] {
        &self.outbox
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Committed row, if any
    pub fn row(&self, table: &str, key: &str) -> Option<Value> {
        self.lock()
            .rows
            .get(&(table.to_string(), key.to_string()))
            .cloned()
    }

    /// Snapshot of every committed outbox message, in insertion order
    pub fn outbox_messages(&self) -> Vec<OutboxMessage> {
        self.lock().outbox.clone()
    }

    pub fn outbox_message(&self, id: Uuid) -> Option<OutboxMessage> {
        self.lock().outbox.iter().find(|m| m.id == id).cloned()
    }

    /// Number of successful commits
    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    /// Make the next `commit` fail and discard its session
    pub fn fail_next_commit(&self) {
        self.lock().fail_next_commit = true;
    }

    /// Make the next polling read (`get_unprocessed` or `get_retryable`) fail
    pub fn fail_next_fetch(&self) {
        self.lock().fail_next_fetch = true;
    }

    fn take_fetch_failure(state: &mut State) -> OutboxResult<()> {
        if std::mem::take(&mut state.fail_next_fetch) {
            return Err(OutboxError::Store("injected fetch failure".to_string()));
        }
        Ok(())
    }

    fn oldest_first<'a>(
        messages: impl Iterator<Item = &'a OutboxMessage>,
        limit: i64,
    ) -> Vec<&'a OutboxMessage> {
        let mut selected: Vec<_> = messages.collect();
        // Stable: equal timestamps keep insertion order
        selected.sort_by_key(|m| m.occurred_on);
        selected.truncate(usize::try_from(limit).unwrap_or(0));
        selected
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    type Session = InMemorySession;

    async fn begin(&self) -> OutboxResult<InMemorySession> {
        Ok(InMemorySession::default())
    }

    async fn commit(&self, session: InMemorySession) -> OutboxResult<()> {
        let mut state = self.lock();

        if std::mem::take(&mut state.fail_next_commit) {
            return Err(OutboxError::Store("injected commit failure".to_string()));
        }

        for message in &session.outbox {
            if state.outbox.iter().any(|m| m.id == message.id) {
                return Err(OutboxError::Store(format!(
                    "duplicate outbox message id {}",
                    message.id
                )));
            }
        }

        for (table, key, value) in session.rows {
            state.rows.insert((table, key), value);
        }
        state.outbox.extend(session.outbox);
        state.commits += 1;

        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for InMemoryStore {
    type Session = InMemorySession;

    async fn add(&self, session: &mut InMemorySession, message: &OutboxMessage) -> OutboxResult<()> {
        let mut pending = message.clone();
        pending.processed_on = None;
        pending.error = None;
        pending.retry_count = 0;
        session.outbox.push(pending);

        tracing::debug!(
            message_id = %message.id,
            event_type = %message.event_type,
            "Integration event enqueued to outbox"
        );

        Ok(())
    }

    async fn get_unprocessed(&self, batch_size: i64) -> OutboxResult<Vec<PendingOutboxMessage>> {
        let mut state = self.lock();
        Self::take_fetch_failure(&mut state)?;
        let unprocessed = state.outbox.iter().filter(|m| !m.is_processed());

        Ok(Self::oldest_first(unprocessed, batch_size)
            .into_iter()
            .map(OutboxMessage::to_pending)
            .collect())
    }

    async fn get_retryable(
        &self,
        batch_size: i64,
        max_retries: i32,
    ) -> OutboxResult<Vec<PendingOutboxMessage>> {
        let mut state = self.lock();
        Self::take_fetch_failure(&mut state)?;
        let retryable = state
            .outbox
            .iter()
            .filter(|m| !m.is_processed() && m.retry_count < max_retries);

        Ok(Self::oldest_first(retryable, batch_size)
            .into_iter()
            .map(OutboxMessage::to_pending)
            .collect())
    }

    async fn get_exhausted(&self, limit: i64, max_retries: i32) -> OutboxResult<Vec<OutboxMessage>> {
        let state = self.lock();
        let exhausted = state.outbox.iter().filter(|m| m.is_exhausted(max_retries));

        Ok(Self::oldest_first(exhausted, limit)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn mark_as_processed(&self, id: Uuid) -> OutboxResult<()> {
        let mut state = self.lock();
        let message = state
            .outbox
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(OutboxError::NotFound(id))?;

        if message.processed_on.is_none() {
            message.processed_on = Some(Utc::now());
        }

        Ok(())
    }

    async fn mark_as_failed(&self, id: Uuid, error: &str, retry_count: i32) -> OutboxResult<()> {
        let mut state = self.lock();
        let message = state
            .outbox
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(OutboxError::NotFound(id))?;

        message.error = Some(error.to_string());
        message.retry_count = message.retry_count.max(retry_count);

        Ok(())
    }

    async fn reset_retries(&self, id: Uuid) -> OutboxResult<()> {
        let mut state = self.lock();
        let message = state
            .outbox
            .iter_mut()
            .find(|m| m.id == id && !m.is_processed())
            .ok_or(OutboxError::NotFound(id))?;

        message.retry_count = 0;
        message.error = None;

        Ok(())
    }
}
